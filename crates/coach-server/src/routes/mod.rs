//! API route modules.

pub mod health;
pub mod sessions;
pub mod vocabulary;

use axum::{
    Json, Router, middleware,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use coach_core::Session;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::middleware::{AuthContext, auth_middleware};
use crate::state::AppState;

/// Create the main router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    // Public routes (no auth)
    let public_routes = Router::new().route("/health", get(health::health_check));

    // Protected routes (require auth)
    let protected_routes = Router::new()
        .merge(sessions::router())
        .merge(vocabulary::router())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .nest("/api", protected_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Error returned by API handlers
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Access denied")]
    Forbidden,
    #[error("{0}")]
    Internal(String),
}

impl From<coach_core::Error> for ApiError {
    fn from(err: coach_core::Error) -> Self {
        match err {
            coach_core::Error::Validation(msg) => ApiError::BadRequest(msg),
            err if err.is_not_found() => ApiError::NotFound(err.to_string()),
            err => {
                error!(error = %err, "Request failed");
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL"),
        };
        let body = Json(serde_json::json!({ "error": self.to_string(), "code": code }));
        (status, body).into_response()
    }
}

/// Load a session and verify the caller owns it
pub(crate) async fn owned_session(
    state: &AppState,
    auth: &AuthContext,
    session_id: &str,
) -> Result<Session, ApiError> {
    let session = state.orchestrator.get_session(session_id).await?;
    if !auth.owns(&session.user_id) {
        return Err(ApiError::Forbidden);
    }
    Ok(session)
}

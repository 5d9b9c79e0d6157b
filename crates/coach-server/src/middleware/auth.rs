//! Authentication middleware for coach-server.
//!
//! The front end sends `Authorization: Bearer <service token>` and names the
//! acting user in `X-Coach-User-ID`.

use axum::{
    Json,
    body::Body,
    extract::State,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use super::AuthContext;
use crate::state::AppState;

pub const USER_ID_HEADER: &str = "X-Coach-User-ID";

/// Authentication error
#[derive(Debug, PartialEq, Eq)]
pub enum AuthError {
    MissingToken,
    InvalidToken,
    MissingUserId,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (error, code) = match self {
            AuthError::MissingToken => ("Missing authentication token", "MISSING_TOKEN"),
            AuthError::InvalidToken => ("Invalid authentication token", "INVALID_TOKEN"),
            AuthError::MissingUserId => ("Missing user ID header", "MISSING_USER_ID"),
        };

        let body = Json(ErrorResponse {
            error: error.to_string(),
            code: code.to_string(),
        });

        (StatusCode::UNAUTHORIZED, body).into_response()
    }
}

/// Authentication middleware for axum
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let token_str = match request.headers().get(header::AUTHORIZATION) {
        Some(value) => value.to_str().map_err(|_| AuthError::InvalidToken)?,
        None => return Err(AuthError::MissingToken),
    };

    // Remove "Bearer " prefix if present
    let token_str = token_str.trim_start_matches("Bearer ").trim();

    if !state.service_token.verify_encoded(token_str) {
        debug!(token_id = %state.service_token.token_id, "Rejected service token");
        return Err(AuthError::InvalidToken);
    }

    let user_id = request
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or(AuthError::MissingUserId)?;

    request.extensions_mut().insert(AuthContext::new(user_id));

    Ok(next.run(request).await)
}

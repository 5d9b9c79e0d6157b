//! Coaching session routes.

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use coach_core::{
    DeleteOutcome, Evaluation, FinalizeOutcome, FollowupEmail, NewSession, Session, SessionResume,
    SessionTurn, StageTransitionOutcome,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{ApiError, owned_session};
use crate::middleware::AuthContext;
use crate::state::AppState;

/// Create session router
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sessions", get(list_sessions).post(create_session))
        .route(
            "/sessions/{id}",
            get(get_session).patch(rename_session).delete(delete_session),
        )
        .route("/sessions/{id}/turns", post(append_turn))
        .route("/sessions/{id}/stage", post(request_stage_transition))
        .route("/sessions/{id}/finalize", post(finalize_session))
        .route("/sessions/{id}/resume", get(get_resume))
        .route("/sessions/{id}/evaluation", get(get_evaluation))
        .route("/sessions/{id}/followup-email", post(generate_followup_email))
}

/// List the caller's sessions, most recently updated first
pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<Session>>, ApiError> {
    let sessions = state.orchestrator.list_sessions(&auth.user_id).await?;
    Ok(Json(sessions))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub goal: String,
    pub target_profile_context: Option<String>,
    pub custom_context: Option<String>,
}

/// Create a new session owned by the caller
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<Session>), ApiError> {
    let session = state
        .orchestrator
        .create_session(NewSession {
            user_id: auth.user_id,
            goal: req.goal,
            target_profile_context: req.target_profile_context,
            custom_context: req.custom_context,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<Json<Session>, ApiError> {
    let session = owned_session(&state, &auth, &id).await?;
    Ok(Json(session))
}

#[derive(Debug, Deserialize)]
pub struct RenameSessionRequest {
    pub goal: String,
}

pub async fn rename_session(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(req): Json<RenameSessionRequest>,
) -> Result<Json<Session>, ApiError> {
    owned_session(&state, &auth, &id).await?;
    let session = state.orchestrator.rename_session(&id, &req.goal).await?;
    Ok(Json(session))
}

pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<Json<DeleteOutcome>, ApiError> {
    owned_session(&state, &auth, &id).await?;
    let outcome = state.orchestrator.delete_session(&id).await?;
    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
pub struct AppendTurnRequest {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct AppendTurnResponse {
    pub turn: SessionTurn,
    pub session: Session,
}

/// Append a transcript turn
pub async fn append_turn(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(req): Json<AppendTurnRequest>,
) -> Result<(StatusCode, Json<AppendTurnResponse>), ApiError> {
    owned_session(&state, &auth, &id).await?;
    let appended = state
        .orchestrator
        .append_turn(&id, &req.role, &req.content)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(AppendTurnResponse {
            turn: appended.turn,
            session: appended.session,
        }),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageTransitionRequest {
    pub target_stage: String,
    pub requested_by: Option<String>,
    pub reason: Option<String>,
}

/// Ask to move the session one stage forward
pub async fn request_stage_transition(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(req): Json<StageTransitionRequest>,
) -> Result<Json<StageTransitionOutcome>, ApiError> {
    owned_session(&state, &auth, &id).await?;
    let outcome = state
        .orchestrator
        .request_stage_transition(
            &id,
            &req.target_stage,
            req.requested_by.as_deref(),
            req.reason.as_deref(),
        )
        .await?;
    Ok(Json(outcome))
}

/// End the session and queue its evaluation
pub async fn finalize_session(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<FinalizeOutcome>), ApiError> {
    owned_session(&state, &auth, &id).await?;
    let outcome = state.orchestrator.finalize_session(&id).await?;
    let status = if outcome.queued {
        StatusCode::ACCEPTED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(outcome)))
}

#[derive(Debug, Deserialize)]
pub struct ResumeQuery {
    pub limit: Option<usize>,
}

pub async fn get_resume(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    Query(query): Query<ResumeQuery>,
) -> Result<Json<SessionResume>, ApiError> {
    owned_session(&state, &auth, &id).await?;
    let resume = state.orchestrator.get_resume(&id, query.limit).await?;
    Ok(Json(resume))
}

/// The evaluation, or `null` while none exists
pub async fn get_evaluation(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<Json<Option<Evaluation>>, ApiError> {
    owned_session(&state, &auth, &id).await?;
    let evaluation = state.orchestrator.get_evaluation(&id).await?;
    Ok(Json(evaluation))
}

#[derive(Debug, Default, Deserialize)]
pub struct FollowupEmailRequest {
    pub tone: Option<String>,
    pub length: Option<String>,
}

pub async fn generate_followup_email(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    body: Option<Json<FollowupEmailRequest>>,
) -> Result<Json<FollowupEmail>, ApiError> {
    owned_session(&state, &auth, &id).await?;
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let email = state
        .orchestrator
        .generate_followup_email(&id, req.tone.as_deref(), req.length.as_deref())
        .await?;
    Ok(Json(email))
}

//! Vocabulary flashcard routes.

use axum::{
    Extension, Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use coach_core::{CardUpdate, NewVocabulary, ReviewSaveOutcome, VocabularyEntry};
use serde::Deserialize;
use std::sync::Arc;

use super::ApiError;
use crate::middleware::AuthContext;
use crate::state::AppState;

/// Create vocabulary router
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/vocabulary", post(save_vocabulary))
        .route("/review", get(start_review).post(save_review))
}

/// Save a vocabulary entry with a fresh review card
pub async fn save_vocabulary(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<NewVocabulary>,
) -> Result<(StatusCode, Json<VocabularyEntry>), ApiError> {
    let entry = state
        .orchestrator
        .save_vocabulary(&auth.user_id, req)
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// Cards due for review
pub async fn start_review(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<VocabularyEntry>>, ApiError> {
    let due = state.orchestrator.start_review(&auth.user_id).await?;
    Ok(Json(due))
}

#[derive(Debug, Deserialize)]
pub struct SaveReviewRequest {
    pub updates: Vec<CardUpdate>,
}

pub async fn save_review(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<SaveReviewRequest>,
) -> Result<Json<ReviewSaveOutcome>, ApiError> {
    let outcome = state
        .orchestrator
        .save_review(&auth.user_id, req.updates)
        .await?;
    Ok(Json(outcome))
}

//! Shared types for coach-core.
//!
//! These types are used by the database layer, the cache snapshots, and the
//! server's JSON responses.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};
use crate::stage::{Stage, StageSignalFlags, StageState};

// ─────────────────────────────────────────────────────────────────────────────
// Enumerations
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Active,
    ProcessingEvaluation,
    Evaluated,
    EvaluationFailed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "ACTIVE",
            SessionStatus::ProcessingEvaluation => "PROCESSING_EVALUATION",
            SessionStatus::Evaluated => "EVALUATED",
            SessionStatus::EvaluationFailed => "EVALUATION_FAILED",
        }
    }

    /// Parse a persisted value; unknown values read as `Active`.
    pub fn parse(value: &str) -> Self {
        match value {
            "PROCESSING_EVALUATION" => SessionStatus::ProcessingEvaluation,
            "EVALUATED" => SessionStatus::Evaluated,
            "EVALUATION_FAILED" => SessionStatus::EvaluationFailed,
            _ => SessionStatus::Active,
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Author of a transcript turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
    System,
}

impl TurnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnRole::User => "user",
            TurnRole::Assistant => "assistant",
            TurnRole::System => "system",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "user" => Ok(TurnRole::User),
            "assistant" => Ok(TurnRole::Assistant),
            "system" => Ok(TurnRole::System),
            other => Err(Error::validation(format!(
                "role must be one of user, assistant, system (got '{}')",
                other
            ))),
        }
    }
}

impl fmt::Display for TurnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Entity Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub goal: String,
    pub status: SessionStatus,
    pub target_profile_context: String,
    pub custom_context: String,
    pub stage: Stage,
    pub stage_entered_at: i64,
    pub stage_user_turns: u32,
    pub stage_signals: StageSignalFlags,
    pub conversation_summary: Option<String>,
    /// Timestamp of the last turn folded into `conversation_summary`.
    pub summary_cursor_at: Option<i64>,
    pub talk_nudges: Vec<String>,
    pub nudges_updated_at: Option<i64>,
    pub display_title: Option<String>,
    pub goal_summary: Option<String>,
    pub metadata_updated_at: Option<i64>,
    pub followup_draft: Option<FollowupEmail>,
    pub created_at: i64,
    pub updated_at: i64,
    pub ended_at: Option<i64>,
}

impl Session {
    /// Stage bookkeeping as explicit policy state.
    pub fn stage_state(&self) -> StageState {
        StageState {
            stage: self.stage,
            entered_at: self.stage_entered_at,
            user_turns: self.stage_user_turns,
            signals: self.stage_signals,
        }
    }

    /// Copy policy state back onto the session.
    pub fn apply_stage_state(&mut self, state: &StageState) {
        self.stage = state.stage;
        self.stage_entered_at = state.entered_at;
        self.stage_user_turns = state.user_turns;
        self.stage_signals = state.signals;
    }

    /// Context line shown when resuming.
    pub fn context_summary(&self) -> String {
        if !self.custom_context.is_empty() {
            self.custom_context.clone()
        } else if !self.target_profile_context.is_empty() {
            self.target_profile_context.clone()
        } else {
            "Default networking context".to_string()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTurn {
    pub id: String,
    pub session_id: String,
    pub role: TurnRole,
    pub content: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub session_id: String,
    pub score: u8,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub next_actions: Vec<String>,
    pub follow_up_email: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowupEmail {
    pub subject: String,
    pub body: String,
}

/// Scheduling record attached to a vocabulary entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewCard {
    pub difficulty: f64,
    pub stability: f64,
    pub due_at: i64,
    pub state: i64,
    pub last_review_at: i64,
    pub reps: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VocabularyEntry {
    pub id: String,
    pub user_id: String,
    pub text: String,
    pub definition: String,
    pub example: String,
    pub example_trans: String,
    pub real_life_def: String,
    pub surrounding_text: String,
    pub video_title: String,
    pub created_at: i64,
    pub card: ReviewCard,
}

// ─────────────────────────────────────────────────────────────────────────────
// Input Types (for creating entities)
// ─────────────────────────────────────────────────────────────────────────────

/// Input for creating a new coaching session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSession {
    pub user_id: String,
    pub goal: String,
    #[serde(default)]
    pub target_profile_context: Option<String>,
    #[serde(default)]
    pub custom_context: Option<String>,
}

/// Input for creating a vocabulary entry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVocabulary {
    pub text: String,
    pub definition: String,
    #[serde(default)]
    pub example: Option<String>,
    #[serde(default)]
    pub example_trans: Option<String>,
    #[serde(default)]
    pub real_life_def: Option<String>,
    #[serde(default)]
    pub surrounding_text: Option<String>,
    #[serde(default)]
    pub video_title: Option<String>,
}

/// Evaluation content produced by the evaluation job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvaluation {
    pub score: u8,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub improvements: Vec<String>,
    #[serde(default)]
    pub next_actions: Vec<String>,
    #[serde(default)]
    pub follow_up_email: String,
}

/// Partial update of a review card; `None` keeps the stored value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardUpdate {
    pub vocabulary_id: String,
    #[serde(default)]
    pub difficulty: Option<f64>,
    #[serde(default)]
    pub stability: Option<f64>,
    #[serde(default)]
    pub due_at: Option<i64>,
    #[serde(default)]
    pub state: Option<i64>,
    #[serde(default)]
    pub last_review_at: Option<i64>,
    #[serde(default)]
    pub reps: Option<i64>,
}

/// Tone of a generated follow-up email
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FollowupTone {
    #[default]
    Professional,
    Friendly,
    Formal,
}

impl FollowupTone {
    /// Lenient parse; anything unrecognized is professional.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "friendly" => FollowupTone::Friendly,
            "formal" => FollowupTone::Formal,
            _ => FollowupTone::Professional,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FollowupTone::Professional => "professional",
            FollowupTone::Friendly => "friendly",
            FollowupTone::Formal => "formal",
        }
    }
}

/// Length of a generated follow-up email
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FollowupLength {
    Short,
    #[default]
    Medium,
    Long,
}

impl FollowupLength {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "short" => Ok(FollowupLength::Short),
            "" | "medium" => Ok(FollowupLength::Medium),
            "long" => Ok(FollowupLength::Long),
            other => Err(Error::validation(format!(
                "length must be one of short, medium, long (got '{}')",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FollowupLength::Short => "short",
            FollowupLength::Medium => "medium",
            FollowupLength::Long => "long",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Operation Results
// ─────────────────────────────────────────────────────────────────────────────

/// Result of an explicit stage transition request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageTransitionOutcome {
    pub applied: bool,
    pub next_stage: Stage,
    pub reason: String,
    pub session: Session,
}

/// Result of finalizing a session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeOutcome {
    pub session: Session,
    /// Whether a new evaluation job was queued by this call.
    pub queued: bool,
    pub message: String,
}

/// Result of deleting a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOutcome {
    pub session_id: String,
    pub deleted: bool,
}

/// Everything a client needs to resume a session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResume {
    pub session: Session,
    pub recent_turns: Vec<SessionTurn>,
    pub summary: Option<String>,
    pub talk_nudges: Vec<String>,
    pub draft_followup_email: Option<FollowupEmail>,
    pub stage_hint: String,
    pub context_summary: String,
}

/// Result of saving review card updates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSaveOutcome {
    pub success: bool,
    pub saved_count: usize,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip_and_unknown() {
        for status in [
            SessionStatus::Active,
            SessionStatus::ProcessingEvaluation,
            SessionStatus::Evaluated,
            SessionStatus::EvaluationFailed,
        ] {
            assert_eq!(SessionStatus::parse(status.as_str()), status);
        }
        assert_eq!(SessionStatus::parse("bogus"), SessionStatus::Active);
    }

    #[test]
    fn test_turn_role_parse() {
        assert_eq!(TurnRole::parse("User").unwrap(), TurnRole::User);
        assert_eq!(TurnRole::parse(" assistant ").unwrap(), TurnRole::Assistant);
        assert!(matches!(TurnRole::parse("moderator"), Err(Error::Validation(_))));
    }

    #[test]
    fn test_followup_options() {
        assert_eq!(FollowupTone::parse("Friendly"), FollowupTone::Friendly);
        assert_eq!(FollowupTone::parse("casual"), FollowupTone::Professional);
        assert_eq!(FollowupLength::parse("").unwrap(), FollowupLength::Medium);
        assert!(FollowupLength::parse("epic").is_err());
    }
}

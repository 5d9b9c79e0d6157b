//! Enrichment collaborator.
//!
//! The language-model worker behind [`EnrichmentClient`] produces summaries,
//! nudges, display metadata, evaluations and follow-up drafts. Every response
//! is validated here before anything is persisted; a response that fails
//! validation counts as a failed attempt.

#[cfg(feature = "http-client")]
mod http;

#[cfg(feature = "http-client")]
pub use http::HttpEnrichmentClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{
    Evaluation, FollowupEmail, FollowupLength, FollowupTone, NewEvaluation, Session, SessionTurn,
};

const MAX_NUDGES: usize = 3;
const TITLE_MAX_CHARS: usize = 56;
const GOAL_SUMMARY_MAX_CHARS: usize = 90;
const DEFAULT_TITLE: &str = "Networking Session";
const DEFAULT_GOAL_SUMMARY: &str = "Have a clear, natural networking conversation.";

// ─────────────────────────────────────────────────────────────────────────────
// Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateRequest {
    pub session: Session,
    pub turns: Vec<SessionTurn>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarizeRequest {
    pub session: Session,
    pub prior_summary: String,
    pub new_turns: Vec<SessionTurn>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SummaryPayload {
    pub summary: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NudgesRequest {
    pub session: Session,
    pub conversation_summary: String,
    pub recent_turns: Vec<SessionTurn>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NudgesPayload {
    pub nudges: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataRequest {
    pub goal: String,
    pub target_profile_context: String,
    pub custom_context: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MetadataPayload {
    #[serde(alias = "title")]
    pub display_title: String,
    pub goal_summary: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowupRequest {
    pub session: Session,
    pub evaluation: Option<Evaluation>,
    pub turns: Vec<SessionTurn>,
    pub tone: FollowupTone,
    pub length: FollowupLength,
}

// ─────────────────────────────────────────────────────────────────────────────
// Client Contract
// ─────────────────────────────────────────────────────────────────────────────

/// Remote worker contract. Any error is treated as a failed attempt.
#[async_trait]
pub trait EnrichmentClient: Send + Sync {
    async fn evaluate(&self, request: EvaluateRequest) -> Result<NewEvaluation>;

    async fn summarize(&self, request: SummarizeRequest) -> Result<SummaryPayload>;

    async fn suggest_nudges(&self, request: NudgesRequest) -> Result<NudgesPayload>;

    async fn derive_metadata(&self, request: MetadataRequest) -> Result<MetadataPayload>;

    async fn draft_followup(&self, request: FollowupRequest) -> Result<FollowupEmail>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Validation
// ─────────────────────────────────────────────────────────────────────────────

/// Reject evaluations whose score is outside 1..=10.
pub fn validate_evaluation(evaluation: NewEvaluation) -> Result<NewEvaluation> {
    if !(1..=10).contains(&evaluation.score) {
        return Err(Error::enrichment(format!(
            "evaluation score out of range: {}",
            evaluation.score
        )));
    }
    Ok(evaluation)
}

/// Trimmed, non-empty summary text.
pub fn validate_summary(payload: SummaryPayload) -> Result<String> {
    let summary = payload.summary.trim();
    if summary.is_empty() {
        return Err(Error::enrichment("empty summary from worker"));
    }
    Ok(summary.to_string())
}

/// Trim, drop empties, keep the first three.
pub fn normalize_nudges(raw: Vec<String>) -> Vec<String> {
    raw.into_iter()
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .take(MAX_NUDGES)
        .collect()
}

/// Normalized nudges, or an error when none survive.
pub fn validate_nudges(payload: NudgesPayload) -> Result<Vec<String>> {
    let nudges = normalize_nudges(payload.nudges);
    if nudges.is_empty() {
        return Err(Error::enrichment("no usable nudges from worker"));
    }
    Ok(nudges)
}

/// Display title and goal summary, falling back to the goal text.
pub fn normalize_metadata(payload: Option<&MetadataPayload>, goal: &str) -> (String, String) {
    let title = payload.map(|p| p.display_title.trim()).unwrap_or("");
    let summary = payload.map(|p| p.goal_summary.trim()).unwrap_or("");

    let title = if title.is_empty() {
        fallback_title(goal)
    } else {
        title.to_string()
    };
    let summary = if summary.is_empty() {
        fallback_goal_summary(goal)
    } else {
        summary.to_string()
    };
    (title, summary)
}

fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let head: String = text.chars().take(max_chars - 1).collect();
        format!("{}…", head.trim_end())
    } else {
        text.to_string()
    }
}

pub fn fallback_title(goal: &str) -> String {
    let goal = goal.trim();
    if goal.is_empty() {
        return DEFAULT_TITLE.to_string();
    }
    truncate_with_ellipsis(goal, TITLE_MAX_CHARS)
}

pub fn fallback_goal_summary(goal: &str) -> String {
    let goal = goal.trim();
    if goal.is_empty() {
        return DEFAULT_GOAL_SUMMARY.to_string();
    }
    truncate_with_ellipsis(goal, GOAL_SUMMARY_MAX_CHARS)
}

/// Trimmed subject and body; both must be present.
pub fn validate_followup(email: FollowupEmail) -> Result<FollowupEmail> {
    let subject = email.subject.trim();
    let body = email.body.trim();
    if subject.is_empty() || body.is_empty() {
        return Err(Error::enrichment("follow-up draft missing subject or body"));
    }
    Ok(FollowupEmail {
        subject: subject.to_string(),
        body: body.to_string(),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Deterministic Follow-up Template
// ─────────────────────────────────────────────────────────────────────────────

fn tone_prefix(tone: FollowupTone) -> &'static str {
    match tone {
        FollowupTone::Friendly => "Great chatting today",
        FollowupTone::Formal => "Thank you for your time",
        FollowupTone::Professional => "Thanks for the conversation",
    }
}

/// Template follow-up used when the worker cannot draft one.
pub fn fallback_followup(
    session: &Session,
    evaluation: Option<&Evaluation>,
    tone: FollowupTone,
    length: FollowupLength,
) -> FollowupEmail {
    let prefix = tone_prefix(tone);
    let goal = &session.goal;

    let body = match length {
        FollowupLength::Short => format!(
            "{prefix}. I appreciated your insights on {goal}. If you are open to it, I would value one concrete suggestion on how to improve my networking conversations."
        ),
        FollowupLength::Medium => format!(
            "{prefix}. I really appreciated your insights on {goal}. I especially found your perspective on collaboration and career growth helpful. If you have time, I would value one practical suggestion on how I can improve my networking conversations and follow-ups."
        ),
        FollowupLength::Long => format!(
            "{prefix}. Thank you again for sharing your time and advice on {goal}. I learned a lot from your perspective, especially around how to ask clearer questions and connect my project experience to business outcomes. I am actively practicing and would greatly appreciate one additional suggestion on what to focus on next. If it is helpful, I can also share a brief summary of how I apply your advice in my next conversation."
        ),
    };

    let body = match evaluation {
        Some(evaluation) => {
            let focus = evaluation
                .next_actions
                .first()
                .map(String::as_str)
                .unwrap_or("asking sharper follow-up questions");
            format!(
                "{body}\n\nP.S. My latest practice score is {}/10 and I am focusing on: {focus}.",
                evaluation.score
            )
        }
        None => body,
    };

    FollowupEmail {
        subject: format!("Follow-up from our networking chat on {goal}"),
        body: format!("Hi,\n\n{body}\n\nBest regards,\n{}", session.user_id),
    }
}

//! Stage policy engine.
//!
//! Pure, side-effect-free decisions about the five-stage conversation flow:
//!
//! - **sequence**: the ordered stages, terminal last
//! - **normalization**: persisted values and requested aliases
//! - **transition**: explicit one-step transition requests
//! - **signals**: sticky per-stage content flags (see [`signals`])
//! - **policy**: gated advance decisions (see [`policy`])
//!
//! Nothing in this module touches storage. Stage bookkeeping is passed in as
//! [`StageState`] and any new state is returned to the caller.

pub mod policy;
pub mod signals;

pub use policy::{
    AdvanceDecision, AdvanceGate, AdvanceInput, StagePolicy, find_forced_target, policy_for,
    should_advance_stage,
};
pub use signals::{PatternSignalDetector, SignalDetector, StageSignalFlags, update_stage_signals};

use serde::{Deserialize, Serialize};
use std::fmt;

/// One phase of the coached conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    SmallTalk,
    Experience,
    Advice,
    WrapUp,
    Done,
}

/// Ordered stage sequence. The last entry is terminal.
pub const STAGE_SEQUENCE: [Stage; 5] = [
    Stage::SmallTalk,
    Stage::Experience,
    Stage::Advice,
    Stage::WrapUp,
    Stage::Done,
];

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::SmallTalk => "SMALL_TALK",
            Stage::Experience => "EXPERIENCE",
            Stage::Advice => "ADVICE",
            Stage::WrapUp => "WRAP_UP",
            Stage::Done => "DONE",
        }
    }

    /// Position in [`STAGE_SEQUENCE`].
    pub fn index(&self) -> usize {
        match self {
            Stage::SmallTalk => 0,
            Stage::Experience => 1,
            Stage::Advice => 2,
            Stage::WrapUp => 3,
            Stage::Done => 4,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Done)
    }

    /// The stage after this one. The terminal stage maps to itself.
    pub fn next(&self) -> Stage {
        STAGE_SEQUENCE
            .get(self.index() + 1)
            .copied()
            .unwrap_or(Stage::Done)
    }

    /// Accepted spellings for explicit transition requests (upper-case).
    fn aliases(&self) -> &'static [&'static str] {
        match self {
            Stage::SmallTalk => &["SMALL_TALK", "SMALL TALK", "SMALLTALK", "INTRO", "WARMUP"],
            Stage::Experience => &["EXPERIENCE", "PROJECTS", "PROJECT", "ROLE"],
            Stage::Advice => &["ADVICE", "RECRUITING", "INTERVIEW", "CAREER"],
            Stage::WrapUp => &["WRAP_UP", "WRAP UP", "CLOSE", "CLOSING", "OUTRO"],
            Stage::Done => &["DONE", "END", "FINISH"],
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stage bookkeeping for a session, reset whenever the stage changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageState {
    pub stage: Stage,
    /// Epoch millis when the current stage was entered.
    pub entered_at: i64,
    /// User turns recorded since entering the stage.
    pub user_turns: u32,
    pub signals: StageSignalFlags,
}

impl StageState {
    /// Fresh bookkeeping for a newly entered stage.
    pub fn entered(stage: Stage, now_ms: i64) -> Self {
        Self {
            stage,
            entered_at: now_ms,
            user_turns: 0,
            signals: StageSignalFlags::default(),
        }
    }

    /// Record one turn. Only user turns move the counter and signal flags;
    /// the stage itself never changes here.
    pub fn record_turn(
        &self,
        detector: &dyn SignalDetector,
        is_user: bool,
        content: &str,
    ) -> StageState {
        if !is_user {
            return self.clone();
        }

        StageState {
            stage: self.stage,
            entered_at: self.entered_at,
            user_turns: self.user_turns.saturating_add(1),
            signals: update_stage_signals(detector, self.stage, &self.signals, content),
        }
    }
}

/// Normalize a persisted stage value. Unknown or missing values map to the first stage.
pub fn normalize_stage(raw: Option<&str>) -> Stage {
    raw.and_then(|value| STAGE_SEQUENCE.iter().find(|s| s.as_str() == value))
        .copied()
        .unwrap_or(STAGE_SEQUENCE[0])
}

/// Resolve a requested stage name or alias, case-insensitively.
///
/// Returns `None` when the input is empty or not recognized.
pub fn normalize_requested_stage(raw: &str) -> Option<Stage> {
    let normalized = raw.trim().to_uppercase();
    if normalized.is_empty() {
        return None;
    }

    STAGE_SEQUENCE
        .iter()
        .find(|stage| stage.aliases().contains(&normalized.as_str()))
        .copied()
}

/// Why an explicit transition request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionRejection {
    UnknownTarget,
    NotAhead,
    MultiStageJump,
    PolicyNotSatisfied,
}

impl TransitionRejection {
    pub fn reason(&self) -> &'static str {
        match self {
            TransitionRejection::UnknownTarget => "Unknown target stage",
            TransitionRejection::NotAhead => "Target stage is not ahead of current stage",
            TransitionRejection::MultiStageJump => "Only one-stage forward transition is allowed",
            TransitionRejection::PolicyNotSatisfied => "Stage policy not satisfied",
        }
    }
}

/// Outcome of [`evaluate_stage_transition`]. A decision only; nothing is mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionDecision {
    pub applied: bool,
    pub next_stage: Stage,
    pub reason: String,
    pub rejection: Option<TransitionRejection>,
}

impl TransitionDecision {
    fn rejected(current: Stage, rejection: TransitionRejection) -> Self {
        Self {
            applied: false,
            next_stage: current,
            reason: rejection.reason().to_string(),
            rejection: Some(rejection),
        }
    }
}

/// Decide whether `requested` is a legal explicit transition from `current`.
///
/// Only a move exactly one position ahead applies.
pub fn evaluate_stage_transition(current: Stage, requested: &str) -> TransitionDecision {
    let Some(target) = normalize_requested_stage(requested) else {
        return TransitionDecision::rejected(current, TransitionRejection::UnknownTarget);
    };

    let current_idx = current.index();
    let target_idx = target.index();

    if target_idx <= current_idx {
        return TransitionDecision::rejected(current, TransitionRejection::NotAhead);
    }

    if target_idx > current_idx + 1 {
        return TransitionDecision::rejected(current, TransitionRejection::MultiStageJump);
    }

    TransitionDecision {
        applied: true,
        next_stage: target,
        reason: format!("Transition approved: {} -> {}", current, target),
        rejection: None,
    }
}

/// Coaching hint for the stage.
pub fn stage_hint(stage: Stage) -> &'static str {
    match stage {
        Stage::SmallTalk => "Start with warm opening, light context, and one tailored question.",
        Stage::Experience => {
            "Explore role scope, projects, cross-team work, and industry insights."
        }
        Stage::Advice => {
            "Ask for recruiting advice, skill gaps, and interview preparation strategies."
        }
        Stage::WrapUp => "Close gracefully, confirm one next action, and prepare follow-up note.",
        Stage::Done => "Session reached closing stage. Finalize when ready for evaluation.",
    }
}

/// The full ordered stage sequence.
pub fn stage_sequence() -> Vec<Stage> {
    STAGE_SEQUENCE.to_vec()
}

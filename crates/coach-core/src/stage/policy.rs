//! Gated stage advancement.
//!
//! Three independent gates, OR-combined:
//! 1. completion: enough user turns AND the stage signal AND minimum dwell
//! 2. time fallback: at least one user turn AND dwell past the fallback
//! 3. turn ceiling: user turns at or past the stage maximum
//!
//! Explicitly requested transitions use a separate parameter set.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use super::signals::{StageSignalFlags, compile};
use super::Stage;

/// Pacing parameters for one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagePolicy {
    pub min_user_turns: u32,
    pub min_seconds_before_advance: i64,
    pub time_fallback_seconds: i64,
    pub max_user_turns_fallback: u32,
    pub request_min_user_turns: u32,
    pub request_min_seconds_before_advance: i64,
    pub request_time_fallback_seconds: i64,
}

/// Policy for a stage. The terminal stage has none.
pub fn policy_for(stage: Stage) -> Option<StagePolicy> {
    match stage {
        Stage::SmallTalk => Some(StagePolicy {
            min_user_turns: 2,
            min_seconds_before_advance: 60,
            time_fallback_seconds: 120,
            max_user_turns_fallback: 5,
            request_min_user_turns: 2,
            request_min_seconds_before_advance: 60,
            request_time_fallback_seconds: 90,
        }),
        Stage::Experience => Some(StagePolicy {
            min_user_turns: 4,
            min_seconds_before_advance: 240,
            time_fallback_seconds: 7 * 60,
            max_user_turns_fallback: 12,
            request_min_user_turns: 3,
            request_min_seconds_before_advance: 180,
            request_time_fallback_seconds: 5 * 60,
        }),
        Stage::Advice => Some(StagePolicy {
            min_user_turns: 2,
            min_seconds_before_advance: 150,
            time_fallback_seconds: 3 * 60,
            max_user_turns_fallback: 6,
            request_min_user_turns: 2,
            request_min_seconds_before_advance: 120,
            request_time_fallback_seconds: 2 * 60,
        }),
        Stage::WrapUp => Some(StagePolicy {
            min_user_turns: 1,
            min_seconds_before_advance: 90,
            time_fallback_seconds: 2 * 60,
            max_user_turns_fallback: 3,
            request_min_user_turns: 1,
            request_min_seconds_before_advance: 60,
            request_time_fallback_seconds: 60,
        }),
        Stage::Done => None,
    }
}

/// Inputs for [`should_advance_stage`].
#[derive(Debug, Clone, Copy)]
pub struct AdvanceInput<'a> {
    pub current: Stage,
    /// Epoch millis when the current stage was entered.
    pub stage_entered_at: i64,
    pub stage_user_turns: u32,
    pub flags: &'a StageSignalFlags,
    pub latest_user_content: Option<&'a str>,
    pub now_ms: i64,
    pub is_requested: bool,
}

/// Which gate allowed an advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvanceGate {
    Completion,
    TimeFallback,
    TurnFallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvanceDecision {
    pub advance: bool,
    pub next_stage: Stage,
    pub reason: String,
    pub gate: Option<AdvanceGate>,
}

impl AdvanceDecision {
    fn hold(stage: Stage, reason: impl Into<String>) -> Self {
        Self {
            advance: false,
            next_stage: stage,
            reason: reason.into(),
            gate: None,
        }
    }
}

static FORCE_TARGETS: LazyLock<Vec<(Stage, Vec<Regex>)>> = LazyLock::new(|| {
    vec![
        (
            Stage::Experience,
            compile(&[
                r"(?i)\bexperience\b",
                r"(?i)\bproject experience\b",
                r"(?i)\bwork experience\b",
            ]),
        ),
        (
            Stage::Advice,
            compile(&[
                r"(?i)\badvice\b",
                r"(?i)\brecruit(ing)?\b",
                r"(?i)\binterview\b",
                r"(?i)\bcareer guidance\b",
            ]),
        ),
        (
            Stage::WrapUp,
            compile(&[r"(?i)\bwrap ?up\b", r"(?i)\bclosing\b", r"(?i)\bfinal part\b"]),
        ),
        (
            Stage::Done,
            compile(&[r"(?i)\bdone\b", r"(?i)\bfinish(ed)?\b", r"(?i)\bend this\b"]),
        ),
    ]
});

/// First stage named by the utterance, if any.
pub fn find_forced_target(content: &str) -> Option<Stage> {
    if content.is_empty() {
        return None;
    }

    FORCE_TARGETS
        .iter()
        .find(|(_, patterns)| patterns.iter().any(|re| re.is_match(content)))
        .map(|(stage, _)| *stage)
}

fn elapsed_seconds(since_ms: i64, now_ms: i64) -> i64 {
    if since_ms <= 0 {
        return 0;
    }
    let diff = now_ms - since_ms;
    if diff > 0 { diff / 1000 } else { 0 }
}

fn hold_tip(stage: Stage) -> &'static str {
    match stage {
        Stage::SmallTalk => {
            "Keep it brief: share your quick background or ask about their team/project."
        }
        Stage::Experience => "Add one concrete detail: metric, tradeoff, or what you owned.",
        Stage::Advice => "Ask one specific advice question.",
        _ => "Thank them and propose a simple follow-up next step.",
    }
}

/// Decide whether the session may leave its current stage.
pub fn should_advance_stage(input: AdvanceInput<'_>) -> AdvanceDecision {
    let stage = input.current;
    if stage.is_terminal() {
        return AdvanceDecision::hold(Stage::Done, "Already done");
    }

    let Some(policy) = policy_for(stage) else {
        return AdvanceDecision::hold(stage, "No policy");
    };

    let turns = input.stage_user_turns;
    let seconds = elapsed_seconds(input.stage_entered_at, input.now_ms);

    let (min_turns, min_seconds, time_fallback) = if input.is_requested {
        (
            policy.request_min_user_turns,
            policy.request_min_seconds_before_advance,
            policy.request_time_fallback_seconds,
        )
    } else {
        (
            policy.min_user_turns,
            policy.min_seconds_before_advance,
            policy.time_fallback_seconds,
        )
    };

    let completion_ok =
        turns >= min_turns && input.flags.satisfies(stage) && seconds >= min_seconds;
    let time_ok = time_fallback > 0 && turns >= 1 && seconds >= time_fallback;
    let max_turns_ok =
        policy.max_user_turns_fallback > 0 && turns >= policy.max_user_turns_fallback;

    let gate = if completion_ok {
        AdvanceGate::Completion
    } else if time_ok {
        AdvanceGate::TimeFallback
    } else if max_turns_ok {
        AdvanceGate::TurnFallback
    } else {
        return AdvanceDecision::hold(stage, hold_tip(stage));
    };

    // A stage named in the utterance is honoured only one step ahead.
    if let Some(forced) = input.latest_user_content.and_then(find_forced_target) {
        if forced.index() == stage.index() + 1 {
            return AdvanceDecision {
                advance: true,
                next_stage: forced,
                reason: "Forced target stage".to_string(),
                gate: Some(gate),
            };
        }
    }

    AdvanceDecision {
        advance: true,
        next_stage: stage.next(),
        reason: "Policy satisfied".to_string(),
        gate: Some(gate),
    }
}

//! Fixtures shared by unit tests.

use crate::stage::{Stage, StageSignalFlags};
use crate::types::{Session, SessionStatus};

pub(crate) fn sample_session(goal: &str) -> Session {
    Session {
        id: "s1".into(),
        user_id: "alex".into(),
        goal: goal.into(),
        status: SessionStatus::Active,
        target_profile_context: String::new(),
        custom_context: String::new(),
        stage: Stage::SmallTalk,
        stage_entered_at: 0,
        stage_user_turns: 0,
        stage_signals: StageSignalFlags::default(),
        conversation_summary: None,
        summary_cursor_at: None,
        talk_nudges: vec![],
        nudges_updated_at: None,
        display_title: None,
        goal_summary: None,
        metadata_updated_at: None,
        followup_draft: None,
        created_at: 0,
        updated_at: 0,
        ended_at: None,
    }
}

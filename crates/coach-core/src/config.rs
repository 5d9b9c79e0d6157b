//! Tunables for caching and background jobs.
//!
//! Deserializable so the server can embed these sections in its TOML file.
//! Every field has a default, so partial sections are fine.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::jobs::{JobKind, RetryPolicy};

/// Cache TTLs in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheTtls {
    pub session_secs: u64,
    pub session_list_secs: u64,
    pub evaluation_secs: u64,
    pub due_items_secs: u64,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            session_secs: 45,
            session_list_secs: 30,
            evaluation_secs: 120,
            due_items_secs: 45,
        }
    }
}

impl CacheTtls {
    pub fn session(&self) -> Duration {
        Duration::from_secs(self.session_secs)
    }

    pub fn session_list(&self) -> Duration {
        Duration::from_secs(self.session_list_secs)
    }

    pub fn evaluation(&self) -> Duration {
        Duration::from_secs(self.evaluation_secs)
    }

    pub fn due_items(&self) -> Duration {
        Duration::from_secs(self.due_items_secs)
    }
}

/// Marker TTLs, retry policies and turn windows for background jobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobSettings {
    pub summary_marker_secs: u64,
    pub nudges_marker_secs: u64,
    pub metadata_marker_secs: u64,

    pub summary_retry: RetryPolicy,
    pub nudges_retry: RetryPolicy,
    pub metadata_retry: RetryPolicy,
    pub evaluation_retry: RetryPolicy,
    pub followup_retry: RetryPolicy,

    /// Turns summarized on the first run.
    pub summary_initial_turns: usize,
    /// Turns after the cursor summarized on later runs.
    pub summary_incremental_turns: usize,
    /// Recent turns handed to the nudge generator.
    pub nudge_recent_turns: usize,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            summary_marker_secs: 25,
            nudges_marker_secs: 10,
            metadata_marker_secs: 20,
            summary_retry: RetryPolicy::new(2, &[1200, 2500]),
            nudges_retry: RetryPolicy::new(2, &[900, 1800]),
            metadata_retry: RetryPolicy::new(2, &[1100, 2200]),
            evaluation_retry: RetryPolicy::new(3, &[1500, 3000, 6000]),
            followup_retry: RetryPolicy::new(1, &[]),
            summary_initial_turns: 120,
            summary_incremental_turns: 80,
            nudge_recent_turns: 14,
        }
    }
}

impl JobSettings {
    /// Marker TTL for a kind. Evaluation takes no marker.
    pub fn marker_ttl(&self, kind: JobKind) -> Option<Duration> {
        let secs = match kind {
            JobKind::Summary => self.summary_marker_secs,
            JobKind::Nudges => self.nudges_marker_secs,
            JobKind::Metadata => self.metadata_marker_secs,
            JobKind::Evaluation => return None,
        };
        Some(Duration::from_secs(secs))
    }

    pub fn retry(&self, kind: JobKind) -> &RetryPolicy {
        match kind {
            JobKind::Summary => &self.summary_retry,
            JobKind::Nudges => &self.nudges_retry,
            JobKind::Metadata => &self.metadata_retry,
            JobKind::Evaluation => &self.evaluation_retry,
        }
    }

    /// Same windows with every retry delay set to `delay_ms`.
    pub fn with_retry_delays(mut self, delay_ms: u64) -> Self {
        for policy in [
            &mut self.summary_retry,
            &mut self.nudges_retry,
            &mut self.metadata_retry,
            &mut self.evaluation_retry,
            &mut self.followup_retry,
        ] {
            policy.delays_ms = vec![delay_ms; policy.attempts as usize];
        }
        self
    }
}

/// Core configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoachConfig {
    pub cache: CacheTtls,
    pub jobs: JobSettings,
    /// Recent turns returned by resume when the caller gives no limit.
    pub resume_turn_limit: usize,
}

impl CoachConfig {
    pub const DEFAULT_RESUME_TURN_LIMIT: usize = 40;

    pub fn resume_turn_limit(&self) -> usize {
        if self.resume_turn_limit == 0 {
            Self::DEFAULT_RESUME_TURN_LIMIT
        } else {
            self.resume_turn_limit
        }
    }
}

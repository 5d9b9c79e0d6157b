//! Background job coordination.
//!
//! - **markers**: at most one pending job per (session, kind), via set-if-absent
//!   markers with a TTL in the shared [`KvStore`]
//! - **tasks**: fire-and-forget spawning on a [`TaskTracker`] so shutdown and
//!   tests can wait for in-flight work
//! - **retry**: bounded attempts with fixed delays (see [`retry`])

pub mod retry;

pub use retry::{RetryPolicy, run_with_retry};

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use crate::cache::KvStore;

/// Kinds of background enrichment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    Summary,
    Nudges,
    Metadata,
    Evaluation,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Summary => "summary",
            JobKind::Nudges => "nudges",
            JobKind::Metadata => "metadata",
            JobKind::Evaluation => "evaluation",
        }
    }

    pub fn marker_key(&self, session_id: &str) -> String {
        format!("job:{}:{}", self.as_str(), session_id)
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Proof that this caller owns the marker for (kind, session).
///
/// Must be handed back to [`PendingJobs::release`] when the job ends.
#[derive(Debug)]
#[must_use]
pub struct JobLease {
    pub kind: JobKind,
    pub session_id: String,
    key: String,
}

/// Pending-job markers in the shared key/value store.
pub struct PendingJobs {
    kv: Arc<dyn KvStore>,
}

impl PendingJobs {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Acquire the marker for (kind, session). `None` means a job is already
    /// pending, or the store could not be reached.
    pub async fn try_acquire(
        &self,
        kind: JobKind,
        session_id: &str,
        ttl: Duration,
    ) -> Option<JobLease> {
        let key = kind.marker_key(session_id);
        match self.kv.set_nx_ex(&key, "1".to_string(), ttl).await {
            Ok(true) => Some(JobLease {
                kind,
                session_id: session_id.to_string(),
                key,
            }),
            Ok(false) => {
                debug!(kind = %kind, session_id = %session_id, "Job already pending");
                None
            }
            Err(e) => {
                warn!(kind = %kind, session_id = %session_id, error = %e, "Marker acquire failed");
                None
            }
        }
    }

    /// Delete the marker unconditionally.
    pub async fn release(&self, lease: JobLease) {
        if let Err(e) = self.kv.del(&[lease.key]).await {
            warn!(
                kind = %lease.kind,
                session_id = %lease.session_id,
                error = %e,
                "Marker release failed; it will expire"
            );
        }
    }

    /// Whether a marker is currently held for (kind, session).
    #[cfg(test)]
    pub async fn is_pending(&self, kind: JobKind, session_id: &str) -> bool {
        matches!(self.kv.get(&kind.marker_key(session_id)).await, Ok(Some(_)))
    }
}

/// Tracker for detached background jobs.
#[derive(Clone, Default)]
pub struct BackgroundTasks {
    tracker: TaskTracker,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a job that the caller does not await.
    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tracker.spawn(future);
    }

    /// Number of jobs still running.
    pub fn len(&self) -> usize {
        self.tracker.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracker.is_empty()
    }

    /// Wait until every job spawned so far (and any they spawn) has finished.
    pub async fn wait_idle(&self) {
        // Jobs may queue follow-up jobs while we wait.
        while !self.tracker.is_empty() {
            self.tracker.close();
            self.tracker.wait().await;
            self.tracker.reopen();
        }
    }
}

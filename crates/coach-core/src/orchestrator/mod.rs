//! Session orchestration: the request-facing operations and their triggers.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                       SessionOrchestrator                        │
//! │   request ops ──→ SessionStore ──→ Database (IMMEDIATE tx)       │
//! │        │               │                                         │
//! │        │               └──→ KvStore (read-through, invalidate)   │
//! │        ▼                                                         │
//! │   PendingJobs (job:<kind>:<id>) ──→ BackgroundTasks              │
//! │                                        │                         │
//! │              summary / nudges / metadata / evaluation services   │
//! │                                        │                         │
//! │                                 EnrichmentClient                 │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Triggers:
//! - any appended turn queues a summary
//! - an assistant turn also queues nudges
//! - create and rename queue metadata
//! - finalize queues the evaluation (no marker)
//!
//! Background failures are logged and never reach the triggering request.

use std::sync::Arc;
use tracing::{info, warn};

use crate::cache::KvStore;
use crate::clock::Clock;
use crate::config::{CoachConfig, JobSettings};
use crate::db::{AppendedTurn, Database};
use crate::enrichment::EnrichmentClient;
use crate::error::{Error, Result};
use crate::jobs::{BackgroundTasks, JobKind, JobLease, PendingJobs};
use crate::services::{
    EvaluationService, FollowupService, MetadataService, NudgeService, SummaryService,
};
use crate::stage::{
    AdvanceDecision, AdvanceInput, PatternSignalDetector, SignalDetector, should_advance_stage,
    stage_hint,
};
use crate::store::SessionStore;
use crate::types::*;

const MAX_GOAL_CHARS: usize = 180;
const SURFACED_NUDGES: usize = 2;
const DEFAULT_REQUESTED_BY: &str = "assistant";

/// Background side of the orchestrator, shared with spawned jobs.
struct Enrichers {
    summary: SummaryService,
    nudges: NudgeService,
    metadata: MetadataService,
    evaluation: EvaluationService,
    jobs: PendingJobs,
    settings: JobSettings,
}

impl Enrichers {
    /// Run one marked job and release its marker, whatever the outcome.
    async fn run_leased(&self, lease: JobLease) {
        let session_id = lease.session_id.clone();
        let result = match lease.kind {
            JobKind::Summary => self.summary.refresh(&session_id).await.map(|_| ()),
            JobKind::Nudges => self.nudges.refresh(&session_id).await.map(|_| ()),
            JobKind::Metadata => self.metadata.refresh(&session_id).await.map(|_| ()),
            JobKind::Evaluation => self.evaluation.run(&session_id).await.map(|_| ()),
        };

        if let Err(e) = result {
            warn!(
                kind = %lease.kind,
                session_id = %session_id,
                error = %e,
                "Background job failed; keeping prior state"
            );
        }

        self.jobs.release(lease).await;
    }
}

/// Composition root for coaching sessions.
pub struct SessionOrchestrator {
    store: Arc<SessionStore>,
    enrichers: Arc<Enrichers>,
    followup: FollowupService,
    tasks: BackgroundTasks,
    config: CoachConfig,
}

impl SessionOrchestrator {
    /// Build with the default pattern signal detector.
    pub fn new(
        db: Arc<Database>,
        kv: Arc<dyn KvStore>,
        client: Arc<dyn EnrichmentClient>,
        clock: Arc<dyn Clock>,
        config: CoachConfig,
    ) -> Self {
        Self::with_detector(
            db,
            kv,
            client,
            clock,
            Arc::new(PatternSignalDetector::default()),
            config,
        )
    }

    pub fn with_detector(
        db: Arc<Database>,
        kv: Arc<dyn KvStore>,
        client: Arc<dyn EnrichmentClient>,
        clock: Arc<dyn Clock>,
        detector: Arc<dyn SignalDetector>,
        config: CoachConfig,
    ) -> Self {
        let store = Arc::new(SessionStore::new(
            db,
            Arc::clone(&kv),
            config.cache.clone(),
            clock,
            detector,
        ));
        let settings = config.jobs.clone();

        let enrichers = Arc::new(Enrichers {
            summary: SummaryService::new(
                Arc::clone(&store),
                Arc::clone(&client),
                settings.retry(JobKind::Summary).clone(),
                settings.summary_initial_turns,
                settings.summary_incremental_turns,
            ),
            nudges: NudgeService::new(
                Arc::clone(&store),
                Arc::clone(&client),
                settings.retry(JobKind::Nudges).clone(),
                settings.nudge_recent_turns,
            ),
            metadata: MetadataService::new(
                Arc::clone(&store),
                Arc::clone(&client),
                settings.retry(JobKind::Metadata).clone(),
            ),
            evaluation: EvaluationService::new(
                Arc::clone(&store),
                Arc::clone(&client),
                settings.retry(JobKind::Evaluation).clone(),
            ),
            jobs: PendingJobs::new(kv),
            settings,
        });

        let followup = FollowupService::new(
            Arc::clone(&store),
            client,
            config.jobs.followup_retry.clone(),
        );

        Self {
            store,
            enrichers,
            followup,
            tasks: BackgroundTasks::new(),
            config,
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn tasks(&self) -> &BackgroundTasks {
        &self.tasks
    }

    /// Wait for every queued background job to finish.
    pub async fn wait_idle(&self) {
        self.tasks.wait_idle().await;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Job Triggers
    // ─────────────────────────────────────────────────────────────────────────

    /// Queue a marked job unless one is already pending. Returns whether it was queued.
    pub async fn queue_job(&self, kind: JobKind, session_id: &str) -> bool {
        if kind == JobKind::Evaluation {
            self.queue_evaluation(session_id);
            return true;
        }

        let Some(ttl) = self.enrichers.settings.marker_ttl(kind) else {
            return false;
        };
        let Some(lease) = self.enrichers.jobs.try_acquire(kind, session_id, ttl).await else {
            return false;
        };

        let enrichers = Arc::clone(&self.enrichers);
        self.tasks.spawn(async move {
            enrichers.run_leased(lease).await;
        });
        true
    }

    fn queue_evaluation(&self, session_id: &str) {
        let enrichers = Arc::clone(&self.enrichers);
        let session_id = session_id.to_string();
        self.tasks.spawn(async move {
            // Failures are logged and recorded on the session by the service.
            let _ = enrichers.evaluation.run(&session_id).await;
        });
    }

    /// Re-queue evaluations left in flight by a previous process.
    pub async fn resume_pending_evaluations(&self) -> Result<usize> {
        let sessions = self.store.sessions_processing_evaluation().await?;
        for session in &sessions {
            self.queue_evaluation(&session.id);
        }
        if !sessions.is_empty() {
            info!(count = sessions.len(), "Re-queued pending evaluations");
        }
        Ok(sessions.len())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sessions
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a session, refresh nudges once inline and queue metadata.
    pub async fn create_session(&self, input: NewSession) -> Result<Session> {
        let user_id = input.user_id.trim().to_string();
        if user_id.is_empty() {
            return Err(Error::validation("userId is required"));
        }
        let goal = input.goal.trim().to_string();
        if goal.is_empty() {
            return Err(Error::validation("goal is required"));
        }

        let input = NewSession {
            user_id,
            goal,
            ..input
        };
        let session = self.store.create_session(input).await?;
        info!(session_id = %session.id, user_id = %session.user_id, "Session created");

        if let Err(e) = self.enrichers.nudges.refresh(&session.id).await {
            warn!(session_id = %session.id, error = %e, "Initial nudges unavailable");
        }
        self.queue_job(JobKind::Metadata, &session.id).await;

        self.store.require_session(&session.id).await
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Session> {
        self.store.require_session(session_id).await
    }

    pub async fn list_sessions(&self, user_id: &str) -> Result<Vec<Session>> {
        self.store.list_sessions(user_id).await
    }

    pub async fn rename_session(&self, session_id: &str, goal: &str) -> Result<Session> {
        let goal = goal.trim();
        if goal.is_empty() {
            return Err(Error::validation("goal is required"));
        }
        if goal.chars().count() > MAX_GOAL_CHARS {
            return Err(Error::validation(format!(
                "goal must be at most {} characters",
                MAX_GOAL_CHARS
            )));
        }

        let session = self.store.rename_session(session_id, goal).await?;
        self.queue_job(JobKind::Metadata, session_id).await;
        Ok(session)
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<DeleteOutcome> {
        self.store.delete_session(session_id).await?;
        info!(session_id = %session_id, "Session deleted");
        Ok(DeleteOutcome {
            session_id: session_id.to_string(),
            deleted: true,
        })
    }

    /// Append a transcript turn. Queues a summary, and nudges for assistant turns.
    pub async fn append_turn(
        &self,
        session_id: &str,
        role: &str,
        content: &str,
    ) -> Result<AppendedTurn> {
        let role = TurnRole::parse(role)?;
        if content.trim().is_empty() {
            return Err(Error::validation("content is required"));
        }

        let appended = self.store.append_turn(session_id, role, content).await?;

        self.queue_job(JobKind::Summary, session_id).await;
        if role == TurnRole::Assistant {
            self.queue_job(JobKind::Nudges, session_id).await;
        }

        Ok(appended)
    }

    pub async fn request_stage_transition(
        &self,
        session_id: &str,
        target_stage: &str,
        requested_by: Option<&str>,
        reason: Option<&str>,
    ) -> Result<StageTransitionOutcome> {
        if target_stage.trim().is_empty() {
            return Err(Error::validation("targetStage is required"));
        }
        let requested_by = requested_by
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(DEFAULT_REQUESTED_BY);

        self.store
            .request_stage_transition(
                session_id,
                target_stage,
                requested_by,
                reason.map(str::trim).unwrap_or(""),
            )
            .await
    }

    /// Organic advance check against the persisted stage state. Read only.
    ///
    /// `latest_user_content` may name the next stage to force a one-step jump.
    pub async fn evaluate_stage_advance(
        &self,
        session_id: &str,
        latest_user_content: Option<&str>,
    ) -> Result<AdvanceDecision> {
        let session = self.store.require_session(session_id).await?;
        Ok(should_advance_stage(AdvanceInput {
            current: session.stage,
            stage_entered_at: session.stage_entered_at,
            stage_user_turns: session.stage_user_turns,
            flags: &session.stage_signals,
            latest_user_content,
            now_ms: self.store.now_ms(),
            is_requested: false,
        }))
    }

    /// End the session and queue its evaluation.
    ///
    /// Idempotent while an evaluation is running or done. A failed evaluation
    /// can be retried by finalizing again.
    pub async fn finalize_session(&self, session_id: &str) -> Result<FinalizeOutcome> {
        let finalized = self.store.finalize_session(session_id).await?;

        let message = if finalized.started {
            self.queue_evaluation(session_id);
            info!(session_id = %session_id, "Session finalized; evaluation queued");
            "Evaluation queued"
        } else if finalized.session.status == SessionStatus::Evaluated {
            "Session already evaluated"
        } else {
            "Evaluation already in progress"
        };

        Ok(FinalizeOutcome {
            session: finalized.session,
            queued: finalized.started,
            message: message.to_string(),
        })
    }

    /// Everything needed to pick a session back up.
    pub async fn get_resume(
        &self,
        session_id: &str,
        limit: Option<usize>,
    ) -> Result<SessionResume> {
        let session = self.store.require_session(session_id).await?;
        let limit = limit
            .filter(|l| *l > 0)
            .unwrap_or_else(|| self.config.resume_turn_limit());
        let recent_turns = self.store.list_recent_turns(session_id, limit).await?;

        Ok(SessionResume {
            recent_turns,
            summary: session.conversation_summary.clone(),
            talk_nudges: session
                .talk_nudges
                .iter()
                .take(SURFACED_NUDGES)
                .cloned()
                .collect(),
            draft_followup_email: session.followup_draft.clone(),
            stage_hint: stage_hint(session.stage).to_string(),
            context_summary: session.context_summary(),
            session,
        })
    }

    pub async fn get_evaluation(&self, session_id: &str) -> Result<Option<Evaluation>> {
        self.store.require_session(session_id).await?;
        self.store.get_evaluation(session_id).await
    }

    pub async fn generate_followup_email(
        &self,
        session_id: &str,
        tone: Option<&str>,
        length: Option<&str>,
    ) -> Result<FollowupEmail> {
        let tone = tone.map(FollowupTone::parse).unwrap_or_default();
        let length = match length {
            Some(length) => FollowupLength::parse(length)?,
            None => FollowupLength::default(),
        };

        let session = self.store.require_session(session_id).await?;
        self.followup.generate(&session, tone, length).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Vocabulary
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn save_vocabulary(
        &self,
        user_id: &str,
        input: NewVocabulary,
    ) -> Result<VocabularyEntry> {
        if input.text.trim().is_empty() {
            return Err(Error::validation("text is required"));
        }
        if input.definition.trim().is_empty() {
            return Err(Error::validation("definition is required"));
        }
        self.store.save_vocabulary(user_id, input).await
    }

    pub async fn start_review(&self, user_id: &str) -> Result<Vec<VocabularyEntry>> {
        self.store.start_review(user_id).await
    }

    pub async fn save_review(
        &self,
        user_id: &str,
        updates: Vec<CardUpdate>,
    ) -> Result<ReviewSaveOutcome> {
        self.store.save_review(user_id, updates).await
    }
}

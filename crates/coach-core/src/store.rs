//! Cached, async facade over [`Database`].
//!
//! Reads are read-through: cache hit, else database, then populate with the
//! entity TTL. Mutations run on a blocking thread inside the database's
//! per-session transaction and, once committed, drop every cache key they made
//! stale through [`SessionStore::invalidate`]. Cache faults are logged and
//! treated as misses.
//!
//! A read-through fill must never land after an invalidation it raced with.
//! Fills and invalidations share one generation counter behind an async mutex:
//! every invalidation bumps it while deleting, and a fill only writes if the
//! generation it saw before reading the database is still current.

use serde::{Serialize, de::DeserializeOwned};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::cache::{CacheKey, KvStore};
use crate::clock::Clock;
use crate::config::CacheTtls;
use crate::db::{AppendedTurn, Database, FinalizedSession};
use crate::error::{Error, Result};
use crate::stage::SignalDetector;
use crate::types::*;

pub struct SessionStore {
    db: Arc<Database>,
    kv: Arc<dyn KvStore>,
    ttls: CacheTtls,
    clock: Arc<dyn Clock>,
    detector: Arc<dyn SignalDetector>,
    generation: Mutex<u64>,
}

impl SessionStore {
    pub fn new(
        db: Arc<Database>,
        kv: Arc<dyn KvStore>,
        ttls: CacheTtls,
        clock: Arc<dyn Clock>,
        detector: Arc<dyn SignalDetector>,
    ) -> Self {
        Self {
            db,
            kv,
            ttls,
            clock,
            detector,
            generation: Mutex::new(0),
        }
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    /// Check database connectivity
    pub async fn ping(&self) -> Result<()> {
        self.call(|db| db.ping()).await
    }

    /// Run a closure against the database on a blocking thread.
    async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Database) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || f(&db)).await?
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Cache Plumbing
    // ─────────────────────────────────────────────────────────────────────────

    async fn cache_get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let key = key.render();
        match self.kv.get(&key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(key = %key, error = %e, "Discarding unreadable cache entry");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache read failed");
                None
            }
        }
    }

    /// Generation to hand back to [`Self::cache_fill`]. Take it before the
    /// database read.
    async fn cache_generation(&self) -> u64 {
        *self.generation.lock().await
    }

    /// Populate `key` unless an invalidation ran since `seen` was taken.
    async fn cache_fill<T: Serialize>(&self, key: &CacheKey, value: &T, ttl: Duration, seen: u64) {
        let key = key.render();
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache encode failed");
                return;
            }
        };

        let generation = self.generation.lock().await;
        if *generation != seen {
            debug!(key = %key, "Skipping cache fill raced by an invalidation");
            return;
        }
        if let Err(e) = self.kv.set_ex(&key, raw, ttl).await {
            warn!(key = %key, error = %e, "Cache write failed");
        }
    }

    /// Drop stale keys after a committed mutation.
    pub async fn invalidate(&self, keys: &[CacheKey]) {
        let rendered: Vec<String> = keys.iter().map(CacheKey::render).collect();
        let mut generation = self.generation.lock().await;
        *generation += 1;
        if let Err(e) = self.kv.del(&rendered).await {
            warn!(keys = ?rendered, error = %e, "Cache invalidation failed");
        }
    }

    async fn invalidate_prefix(&self, prefix: &str) {
        let mut generation = self.generation.lock().await;
        *generation += 1;
        if let Err(e) = self.kv.del_prefix(prefix).await {
            warn!(prefix = %prefix, error = %e, "Cache prefix invalidation failed");
        }
    }

    fn session_keys(session_id: &str, user_id: &str) -> [CacheKey; 2] {
        [
            CacheKey::session(session_id),
            CacheKey::session_list(user_id),
        ]
    }

    async fn after_session_write(&self, session: &Session) {
        self.invalidate(&Self::session_keys(&session.id, &session.user_id)).await;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sessions
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn get_session(&self, session_id: &str) -> Result<Option<Session>> {
        let key = CacheKey::session(session_id);
        if let Some(session) = self.cache_get::<Session>(&key).await {
            return Ok(Some(session));
        }

        let seen = self.cache_generation().await;
        let id = session_id.to_string();
        let session = self.call(move |db| db.get_session(&id)).await?;
        if let Some(ref session) = session {
            self.cache_fill(&key, session, self.ttls.session(), seen).await;
        }
        Ok(session)
    }

    /// Session or [`Error::SessionNotFound`].
    pub async fn require_session(&self, session_id: &str) -> Result<Session> {
        self.get_session(session_id)
            .await?
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))
    }

    pub async fn list_sessions(&self, user_id: &str) -> Result<Vec<Session>> {
        let key = CacheKey::session_list(user_id);
        if let Some(sessions) = self.cache_get::<Vec<Session>>(&key).await {
            return Ok(sessions);
        }

        let seen = self.cache_generation().await;
        let user = user_id.to_string();
        let sessions = self.call(move |db| db.list_sessions_for_user(&user)).await?;
        self.cache_fill(&key, &sessions, self.ttls.session_list(), seen).await;
        Ok(sessions)
    }

    pub async fn create_session(&self, input: NewSession) -> Result<Session> {
        let now = self.now_ms();
        let session = self.call(move |db| db.create_session(&input, now)).await?;
        self.after_session_write(&session).await;
        Ok(session)
    }

    pub async fn rename_session(&self, session_id: &str, goal: &str) -> Result<Session> {
        let now = self.now_ms();
        let (id, goal) = (session_id.to_string(), goal.to_string());
        let session = self.call(move |db| db.rename_session(&id, &goal, now)).await?;
        self.after_session_write(&session).await;
        Ok(session)
    }

    /// Delete a session and everything hanging off it. Returns the owner.
    pub async fn delete_session(&self, session_id: &str) -> Result<String> {
        let id = session_id.to_string();
        let owner = self.call(move |db| db.delete_session(&id)).await?;
        self.invalidate(&[
            CacheKey::session(session_id),
            CacheKey::session_list(&owner),
            CacheKey::evaluation(session_id),
        ])
        .await;
        Ok(owner)
    }

    pub async fn append_turn(
        &self,
        session_id: &str,
        role: TurnRole,
        content: &str,
    ) -> Result<AppendedTurn> {
        let now = self.now_ms();
        let detector = Arc::clone(&self.detector);
        let (id, content) = (session_id.to_string(), content.to_string());
        let appended = self
            .call(move |db| db.append_turn(&id, role, &content, detector.as_ref(), now))
            .await?;
        self.after_session_write(&appended.session).await;
        Ok(appended)
    }

    pub async fn request_stage_transition(
        &self,
        session_id: &str,
        target: &str,
        requested_by: &str,
        reason: &str,
    ) -> Result<StageTransitionOutcome> {
        let now = self.now_ms();
        let (id, target, requested_by, reason) = (
            session_id.to_string(),
            target.to_string(),
            requested_by.to_string(),
            reason.to_string(),
        );
        let outcome = self
            .call(move |db| db.request_stage_transition(&id, &target, &requested_by, &reason, now))
            .await?;
        if outcome.applied {
            self.after_session_write(&outcome.session).await;
        }
        Ok(outcome)
    }

    pub async fn finalize_session(&self, session_id: &str) -> Result<FinalizedSession> {
        let now = self.now_ms();
        let id = session_id.to_string();
        let finalized = self.call(move |db| db.finalize_session(&id, now)).await?;
        if finalized.started {
            let session = &finalized.session;
            self.invalidate(&[
                CacheKey::session(&session.id),
                CacheKey::session_list(&session.user_id),
                CacheKey::evaluation(&session.id),
            ])
            .await;
        }
        Ok(finalized)
    }

    pub async fn mark_evaluation_failed(&self, session_id: &str) -> Result<Option<Session>> {
        let now = self.now_ms();
        let id = session_id.to_string();
        let session = self.call(move |db| db.mark_evaluation_failed(&id, now)).await?;
        if let Some(ref session) = session {
            self.after_session_write(session).await;
        }
        Ok(session)
    }

    pub async fn sessions_processing_evaluation(&self) -> Result<Vec<Session>> {
        self.call(|db| db.list_sessions_processing_evaluation()).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Evaluations
    // ─────────────────────────────────────────────────────────────────────────

    /// Returns `None` when the session no longer exists.
    pub async fn save_evaluation(
        &self,
        session_id: &str,
        evaluation: NewEvaluation,
    ) -> Result<Option<Evaluation>> {
        let now = self.now_ms();
        let id = session_id.to_string();
        let saved = self
            .call(move |db| db.save_evaluation(&id, &evaluation, now))
            .await?;

        match saved {
            Some((evaluation, session)) => {
                self.invalidate(&[
                    CacheKey::session(&session.id),
                    CacheKey::session_list(&session.user_id),
                    CacheKey::evaluation(&session.id),
                ])
                .await;
                Ok(Some(evaluation))
            }
            None => Ok(None),
        }
    }

    pub async fn get_evaluation(&self, session_id: &str) -> Result<Option<Evaluation>> {
        let key = CacheKey::evaluation(session_id);
        if let Some(evaluation) = self.cache_get::<Evaluation>(&key).await {
            return Ok(Some(evaluation));
        }

        let seen = self.cache_generation().await;
        let id = session_id.to_string();
        let evaluation = self.call(move |db| db.get_evaluation(&id)).await?;
        if let Some(ref evaluation) = evaluation {
            self.cache_fill(&key, evaluation, self.ttls.evaluation(), seen).await;
        }
        Ok(evaluation)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Derived Fields
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn save_conversation_summary(
        &self,
        session_id: &str,
        summary: String,
        cursor_at: Option<i64>,
    ) -> Result<Option<Session>> {
        let now = self.now_ms();
        let id = session_id.to_string();
        let session = self
            .call(move |db| db.save_conversation_summary(&id, &summary, cursor_at, now))
            .await?;
        if let Some(ref session) = session {
            self.after_session_write(session).await;
        }
        Ok(session)
    }

    pub async fn save_talk_nudges(
        &self,
        session_id: &str,
        nudges: Vec<String>,
    ) -> Result<Option<Session>> {
        let now = self.now_ms();
        let id = session_id.to_string();
        let session = self
            .call(move |db| db.save_talk_nudges(&id, &nudges, now))
            .await?;
        if let Some(ref session) = session {
            self.after_session_write(session).await;
        }
        Ok(session)
    }

    pub async fn save_session_metadata(
        &self,
        session_id: &str,
        display_title: String,
        goal_summary: String,
    ) -> Result<Option<Session>> {
        let now = self.now_ms();
        let id = session_id.to_string();
        let session = self
            .call(move |db| db.save_session_metadata(&id, &display_title, &goal_summary, now))
            .await?;
        if let Some(ref session) = session {
            self.after_session_write(session).await;
        }
        Ok(session)
    }

    pub async fn save_followup_draft(
        &self,
        session_id: &str,
        draft: FollowupEmail,
    ) -> Result<Option<Session>> {
        let now = self.now_ms();
        let id = session_id.to_string();
        let session = self
            .call(move |db| db.save_followup_draft(&id, &draft, now))
            .await?;
        if let Some(ref session) = session {
            self.after_session_write(session).await;
        }
        Ok(session)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Turns (never cached)
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn get_turns(&self, session_id: &str) -> Result<Vec<SessionTurn>> {
        let id = session_id.to_string();
        self.call(move |db| db.get_turns(&id)).await
    }

    pub async fn list_recent_turns(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<SessionTurn>> {
        let id = session_id.to_string();
        self.call(move |db| db.list_recent_turns(&id, limit)).await
    }

    pub async fn list_turns_after(
        &self,
        session_id: &str,
        cursor_at: i64,
        limit: usize,
    ) -> Result<Vec<SessionTurn>> {
        let id = session_id.to_string();
        self.call(move |db| db.list_turns_after(&id, cursor_at, limit))
            .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Vocabulary
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn save_vocabulary(
        &self,
        user_id: &str,
        input: NewVocabulary,
    ) -> Result<VocabularyEntry> {
        let now = self.now_ms();
        let user = user_id.to_string();
        let entry = self
            .call(move |db| db.save_vocabulary(&user, &input, now))
            .await?;
        self.invalidate(&[CacheKey::due_items(user_id)]).await;
        Ok(entry)
    }

    pub async fn start_review(&self, user_id: &str) -> Result<Vec<VocabularyEntry>> {
        let key = CacheKey::due_items(user_id);
        if let Some(entries) = self.cache_get::<Vec<VocabularyEntry>>(&key).await {
            return Ok(entries);
        }

        let seen = self.cache_generation().await;
        let now = self.now_ms();
        let user = user_id.to_string();
        let entries = self
            .call(move |db| db.list_due_vocabulary(&user, now))
            .await?;
        self.cache_fill(&key, &entries, self.ttls.due_items(), seen).await;
        Ok(entries)
    }

    pub async fn save_review(
        &self,
        user_id: &str,
        updates: Vec<CardUpdate>,
    ) -> Result<ReviewSaveOutcome> {
        let user = user_id.to_string();
        let outcome = self
            .call(move |db| db.save_review_updates(&user, &updates))
            .await?;
        self.invalidate_prefix(CacheKey::DUE_ITEMS_PREFIX).await;
        Ok(outcome)
    }
}

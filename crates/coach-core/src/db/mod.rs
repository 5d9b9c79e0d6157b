//! Direct SQLite database access for coaching sessions.
//!
//! Every session mutation runs inside a `BEGIN IMMEDIATE` transaction, which
//! takes the database write lock before the session row is read. That lock is
//! the only hard mutual-exclusion primitive in the system: concurrent appends
//! and transition requests for one session execute one at a time.
//!
//! Dropping a transaction without committing rolls it back, so any `?` inside
//! a mutation leaves the stored state untouched.

mod schema;
pub mod vocabulary;

use crate::error::{Error, Result};
use crate::stage::{
    AdvanceInput, SignalDetector, Stage, StageSignalFlags, StageState, TransitionRejection,
    evaluate_stage_transition, normalize_stage, should_advance_stage,
};
use crate::types::*;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

const SESSION_COLUMNS: &str = "id, user_id, goal, status, target_profile_context, custom_context,
     stage_state, stage_entered_at, stage_user_turns, stage_signal_flags,
     conversation_summary, summary_cursor_at, talk_nudges, nudges_updated_at,
     display_title, goal_summary, metadata_updated_at, followup_draft,
     created_at, updated_at, ended_at";

const TURN_COLUMNS: &str = "id, session_id, role, content, created_at";

const DEFAULT_TARGET_CONTEXT: &str = "Default networking context: friendly small talk, role exploration, and actionable recruiting advice.";

/// Result of appending a turn: the stored turn and the session after bookkeeping.
#[derive(Debug, Clone)]
pub struct AppendedTurn {
    pub turn: SessionTurn,
    pub session: Session,
}

/// Result of a finalize call.
#[derive(Debug, Clone)]
pub struct FinalizedSession {
    pub session: Session,
    /// True when this call moved the session into evaluation.
    pub started: bool,
}

/// Database connection wrapper.
///
/// Thread-safe via internal Mutex. All database operations acquire the lock.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open database at specific path, creating the schema if needed
    pub fn open_path(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(Error::Database)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        Self::init(conn)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(Error::Database)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(schema::CREATE_SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| Error::LockPoisoned)
    }

    /// Check database connectivity
    pub fn ping(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch("SELECT 1").map_err(Error::Database)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Session Reads
    // ─────────────────────────────────────────────────────────────────────────

    /// Get session by ID
    pub fn get_session(&self, session_id: &str) -> Result<Option<Session>> {
        let conn = self.lock()?;
        Self::read_session(&conn, session_id)
    }

    fn read_session(conn: &Connection, session_id: &str) -> Result<Option<Session>> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1");
        Ok(conn
            .query_row(&sql, params![session_id], Self::map_session)
            .optional()?)
    }

    fn require_session(conn: &Connection, session_id: &str) -> Result<Session> {
        Self::read_session(conn, session_id)?
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))
    }

    /// List sessions owned by a user, most recently updated first
    pub fn list_sessions_for_user(&self, user_id: &str) -> Result<Vec<Session>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE user_id = ?1 ORDER BY updated_at DESC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let sessions = stmt
            .query_map(params![user_id], Self::map_session)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(sessions)
    }

    /// Sessions left in evaluation (e.g. by a restart mid-job)
    pub fn list_sessions_processing_evaluation(&self) -> Result<Vec<Session>> {
        let conn = self.lock()?;
        let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE status = ?1");
        let mut stmt = conn.prepare(&sql)?;
        let sessions = stmt
            .query_map(
                params![SessionStatus::ProcessingEvaluation.as_str()],
                Self::map_session,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(sessions)
    }

    fn map_session(row: &rusqlite::Row) -> rusqlite::Result<Session> {
        let status: String = row.get(3)?;
        let stage: Option<String> = row.get(6)?;
        let signals: String = row.get(9)?;
        let nudges: String = row.get(12)?;
        let draft: Option<String> = row.get(17)?;

        Ok(Session {
            id: row.get(0)?,
            user_id: row.get(1)?,
            goal: row.get(2)?,
            status: SessionStatus::parse(&status),
            target_profile_context: row.get(4)?,
            custom_context: row.get(5)?,
            stage: normalize_stage(stage.as_deref()),
            stage_entered_at: row.get(7)?,
            stage_user_turns: row.get(8)?,
            stage_signals: serde_json::from_str(&signals).unwrap_or_default(),
            conversation_summary: row.get(10)?,
            summary_cursor_at: row.get(11)?,
            talk_nudges: serde_json::from_str(&nudges).unwrap_or_default(),
            nudges_updated_at: row.get(13)?,
            display_title: row.get(14)?,
            goal_summary: row.get(15)?,
            metadata_updated_at: row.get(16)?,
            followup_draft: draft.and_then(|d| serde_json::from_str(&d).ok()),
            created_at: row.get(18)?,
            updated_at: row.get(19)?,
            ended_at: row.get(20)?,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Session Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a new coaching session in the first stage
    pub fn create_session(&self, input: &NewSession, now: i64) -> Result<Session> {
        let conn = self.lock()?;
        let id = uuid::Uuid::new_v4().to_string();

        let target = input.target_profile_context.as_deref().unwrap_or("").trim();
        let custom = input.custom_context.as_deref().unwrap_or("").trim();
        let target = if target.is_empty() && custom.is_empty() {
            DEFAULT_TARGET_CONTEXT
        } else {
            target
        };
        let stage = StageState::entered(Stage::SmallTalk, now);

        conn.execute(
            "INSERT INTO sessions
             (id, user_id, goal, status, target_profile_context, custom_context,
              stage_state, stage_entered_at, stage_user_turns, stage_signal_flags,
              talk_nudges, created_at, updated_at, ended_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, ?9, '[]', ?8, ?8, NULL)",
            params![
                id,
                input.user_id,
                input.goal,
                SessionStatus::Active.as_str(),
                target,
                custom,
                stage.stage.as_str(),
                now,
                serde_json::to_string(&stage.signals)?,
            ],
        )?;

        Self::require_session(&conn, &id)
    }

    /// Replace the session goal
    pub fn rename_session(&self, session_id: &str, goal: &str, now: i64) -> Result<Session> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE sessions SET goal = ?2, updated_at = ?3 WHERE id = ?1",
            params![session_id, goal, now],
        )?;
        if changed == 0 {
            return Err(Error::SessionNotFound(session_id.to_string()));
        }
        Self::require_session(&conn, session_id)
    }

    /// Delete a session with its turns and evaluation; returns the owner id
    pub fn delete_session(&self, session_id: &str) -> Result<String> {
        let conn = self.lock()?;
        let owner: Option<String> = conn
            .query_row(
                "DELETE FROM sessions WHERE id = ?1 RETURNING user_id",
                params![session_id],
                |row| row.get(0),
            )
            .optional()?;
        owner.ok_or_else(|| Error::SessionNotFound(session_id.to_string()))
    }

    /// Append a transcript turn and update stage bookkeeping in one transaction.
    ///
    /// Only user turns move the stage counter and signal flags. The stage itself
    /// never changes here.
    pub fn append_turn(
        &self,
        session_id: &str,
        role: TurnRole,
        content: &str,
        detector: &dyn SignalDetector,
        now: i64,
    ) -> Result<AppendedTurn> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let session = Self::require_session(&tx, session_id)?;

        // Strictly increasing per session, even when the clock stalls.
        let last: Option<i64> = tx.query_row(
            "SELECT MAX(created_at) FROM session_turns WHERE session_id = ?1",
            params![session_id],
            |row| row.get(0),
        )?;
        let created_at = match last {
            Some(last) if last >= now => last + 1,
            _ => now,
        };

        let turn = SessionTurn {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            role,
            content: content.to_string(),
            created_at,
        };

        tx.execute(
            "INSERT INTO session_turns (id, session_id, role, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![turn.id, turn.session_id, role.as_str(), turn.content, turn.created_at],
        )?;

        let next = session
            .stage_state()
            .record_turn(detector, role == TurnRole::User, content);

        tx.execute(
            "UPDATE sessions
             SET stage_user_turns = ?2, stage_signal_flags = ?3, updated_at = ?4
             WHERE id = ?1",
            params![
                session_id,
                next.user_turns,
                serde_json::to_string(&next.signals)?,
                created_at,
            ],
        )?;

        let session = Self::require_session(&tx, session_id)?;
        tx.commit()?;

        debug!(
            session_id = %session_id,
            role = %role,
            stage_user_turns = session.stage_user_turns,
            "Turn appended"
        );

        Ok(AppendedTurn { turn, session })
    }

    /// Apply an explicit stage transition if both the one-step rule and the
    /// requested-advance policy agree. Otherwise nothing is written.
    pub fn request_stage_transition(
        &self,
        session_id: &str,
        target: &str,
        requested_by: &str,
        reason: &str,
        now: i64,
    ) -> Result<StageTransitionOutcome> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let session = Self::require_session(&tx, session_id)?;
        let current = session.stage;

        let transition = evaluate_stage_transition(current, target);
        if !transition.applied {
            info!(
                session_id = %session_id,
                target = %target,
                requested_by = %requested_by,
                reason = %transition.reason,
                "Stage transition rejected"
            );
            return Ok(StageTransitionOutcome {
                applied: false,
                next_stage: current,
                reason: transition.reason,
                session,
            });
        }

        let decision = should_advance_stage(AdvanceInput {
            current,
            stage_entered_at: session.stage_entered_at,
            stage_user_turns: session.stage_user_turns,
            flags: &session.stage_signals,
            latest_user_content: None,
            now_ms: now,
            is_requested: true,
        });

        if !decision.advance || decision.next_stage != transition.next_stage {
            let reason = format!(
                "{}: {}",
                TransitionRejection::PolicyNotSatisfied.reason(),
                decision.reason
            );
            info!(
                session_id = %session_id,
                target = %transition.next_stage,
                requested_by = %requested_by,
                reason = %reason,
                "Stage transition held by policy"
            );
            return Ok(StageTransitionOutcome {
                applied: false,
                next_stage: current,
                reason,
                session,
            });
        }

        let entered = StageState::entered(transition.next_stage, now);
        tx.execute(
            "UPDATE sessions
             SET stage_state = ?2, stage_entered_at = ?3, stage_user_turns = 0,
                 stage_signal_flags = ?4, updated_at = ?3
             WHERE id = ?1",
            params![
                session_id,
                entered.stage.as_str(),
                now,
                serde_json::to_string(&StageSignalFlags::default())?,
            ],
        )?;

        let session = Self::require_session(&tx, session_id)?;
        tx.commit()?;

        info!(
            session_id = %session_id,
            from = %current,
            to = %entered.stage,
            requested_by = %requested_by,
            "Stage transition applied"
        );

        let reason = if reason.is_empty() {
            transition.reason
        } else {
            format!("{} ({})", transition.reason, reason)
        };

        Ok(StageTransitionOutcome {
            applied: true,
            next_stage: entered.stage,
            reason,
            session,
        })
    }

    /// Move the session into evaluation.
    ///
    /// `ended_at` is stamped only once. Sessions already in evaluation or
    /// evaluated are returned unchanged with `started = false`.
    pub fn finalize_session(&self, session_id: &str, now: i64) -> Result<FinalizedSession> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let session = Self::require_session(&tx, session_id)?;
        if matches!(
            session.status,
            SessionStatus::ProcessingEvaluation | SessionStatus::Evaluated
        ) {
            return Ok(FinalizedSession {
                session,
                started: false,
            });
        }

        tx.execute(
            "UPDATE sessions
             SET status = ?2, ended_at = COALESCE(ended_at, ?3), updated_at = ?3
             WHERE id = ?1",
            params![
                session_id,
                SessionStatus::ProcessingEvaluation.as_str(),
                now
            ],
        )?;

        let session = Self::require_session(&tx, session_id)?;
        tx.commit()?;

        Ok(FinalizedSession {
            session,
            started: true,
        })
    }

    /// Record a terminal evaluation failure
    pub fn mark_evaluation_failed(&self, session_id: &str, now: i64) -> Result<Option<Session>> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE sessions SET status = ?2, updated_at = ?3 WHERE id = ?1",
            params![session_id, SessionStatus::EvaluationFailed.as_str(), now],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        Self::read_session(&conn, session_id)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Evaluations
    // ─────────────────────────────────────────────────────────────────────────

    /// Upsert the evaluation and mark the session evaluated.
    ///
    /// Returns `None` when the session was deleted while the job ran.
    pub fn save_evaluation(
        &self,
        session_id: &str,
        evaluation: &NewEvaluation,
        now: i64,
    ) -> Result<Option<(Evaluation, Session)>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if Self::read_session(&tx, session_id)?.is_none() {
            return Ok(None);
        }

        tx.execute(
            "INSERT INTO session_evaluations
             (session_id, score, strengths, improvements, next_actions, follow_up_email, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT (session_id) DO UPDATE SET
               score = excluded.score,
               strengths = excluded.strengths,
               improvements = excluded.improvements,
               next_actions = excluded.next_actions,
               follow_up_email = excluded.follow_up_email,
               created_at = excluded.created_at",
            params![
                session_id,
                evaluation.score,
                serde_json::to_string(&evaluation.strengths)?,
                serde_json::to_string(&evaluation.improvements)?,
                serde_json::to_string(&evaluation.next_actions)?,
                evaluation.follow_up_email,
                now,
            ],
        )?;

        tx.execute(
            "UPDATE sessions SET status = ?2, updated_at = ?3 WHERE id = ?1",
            params![session_id, SessionStatus::Evaluated.as_str(), now],
        )?;

        let stored = Self::read_evaluation(&tx, session_id)?;
        let session = Self::require_session(&tx, session_id)?;
        tx.commit()?;

        Ok(stored.map(|evaluation| (evaluation, session)))
    }

    /// Get the evaluation for a session
    pub fn get_evaluation(&self, session_id: &str) -> Result<Option<Evaluation>> {
        let conn = self.lock()?;
        Self::read_evaluation(&conn, session_id)
    }

    fn read_evaluation(conn: &Connection, session_id: &str) -> Result<Option<Evaluation>> {
        Ok(conn
            .query_row(
                "SELECT session_id, score, strengths, improvements, next_actions,
                        follow_up_email, created_at
                 FROM session_evaluations WHERE session_id = ?1",
                params![session_id],
                Self::map_evaluation,
            )
            .optional()?)
    }

    fn map_evaluation(row: &rusqlite::Row) -> rusqlite::Result<Evaluation> {
        let strengths: String = row.get(2)?;
        let improvements: String = row.get(3)?;
        let next_actions: String = row.get(4)?;
        Ok(Evaluation {
            session_id: row.get(0)?,
            score: row.get(1)?,
            strengths: serde_json::from_str(&strengths).unwrap_or_default(),
            improvements: serde_json::from_str(&improvements).unwrap_or_default(),
            next_actions: serde_json::from_str(&next_actions).unwrap_or_default(),
            follow_up_email: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Derived Fields
    // ─────────────────────────────────────────────────────────────────────────

    /// Store a new rolling summary and advance the cursor
    pub fn save_conversation_summary(
        &self,
        session_id: &str,
        summary: &str,
        cursor_at: Option<i64>,
        now: i64,
    ) -> Result<Option<Session>> {
        self.update_derived(
            session_id,
            "UPDATE sessions
             SET conversation_summary = ?2,
                 summary_cursor_at = COALESCE(?3, summary_cursor_at),
                 updated_at = ?4
             WHERE id = ?1",
            params![session_id, summary, cursor_at, now],
        )
    }

    /// Store freshly generated talk nudges
    pub fn save_talk_nudges(
        &self,
        session_id: &str,
        nudges: &[String],
        now: i64,
    ) -> Result<Option<Session>> {
        self.update_derived(
            session_id,
            "UPDATE sessions SET talk_nudges = ?2, nudges_updated_at = ?3, updated_at = ?3
             WHERE id = ?1",
            params![session_id, serde_json::to_string(nudges)?, now],
        )
    }

    /// Store display metadata derived from the goal
    pub fn save_session_metadata(
        &self,
        session_id: &str,
        display_title: &str,
        goal_summary: &str,
        now: i64,
    ) -> Result<Option<Session>> {
        self.update_derived(
            session_id,
            "UPDATE sessions
             SET display_title = ?2, goal_summary = ?3, metadata_updated_at = ?4, updated_at = ?4
             WHERE id = ?1",
            params![session_id, display_title, goal_summary, now],
        )
    }

    /// Cache the latest follow-up email draft on the session
    pub fn save_followup_draft(
        &self,
        session_id: &str,
        draft: &FollowupEmail,
        now: i64,
    ) -> Result<Option<Session>> {
        self.update_derived(
            session_id,
            "UPDATE sessions SET followup_draft = ?2, updated_at = ?3 WHERE id = ?1",
            params![session_id, serde_json::to_string(draft)?, now],
        )
    }

    fn update_derived(
        &self,
        session_id: &str,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Option<Session>> {
        let conn = self.lock()?;
        if conn.execute(sql, params)? == 0 {
            return Ok(None);
        }
        Self::read_session(&conn, session_id)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Turn Reads
    // ─────────────────────────────────────────────────────────────────────────

    /// All turns in canonical order
    pub fn get_turns(&self, session_id: &str) -> Result<Vec<SessionTurn>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {TURN_COLUMNS} FROM session_turns WHERE session_id = ?1 ORDER BY created_at ASC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let turns = stmt
            .query_map(params![session_id], Self::map_turn)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(turns)
    }

    /// The most recent `limit` turns, oldest first
    pub fn list_recent_turns(&self, session_id: &str, limit: usize) -> Result<Vec<SessionTurn>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {TURN_COLUMNS} FROM session_turns WHERE session_id = ?1
             ORDER BY created_at DESC LIMIT ?2"
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut turns = stmt
            .query_map(params![session_id, limit as i64], Self::map_turn)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        turns.reverse();
        Ok(turns)
    }

    /// Turns strictly after `cursor_at`, oldest first, at most `limit`
    pub fn list_turns_after(
        &self,
        session_id: &str,
        cursor_at: i64,
        limit: usize,
    ) -> Result<Vec<SessionTurn>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {TURN_COLUMNS} FROM session_turns WHERE session_id = ?1 AND created_at > ?2
             ORDER BY created_at ASC LIMIT ?3"
        );
        let mut stmt = conn.prepare(&sql)?;
        let turns = stmt
            .query_map(params![session_id, cursor_at, limit as i64], Self::map_turn)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(turns)
    }

    fn map_turn(row: &rusqlite::Row) -> rusqlite::Result<SessionTurn> {
        let role: String = row.get(2)?;
        Ok(SessionTurn {
            id: row.get(0)?,
            session_id: row.get(1)?,
            role: TurnRole::parse(&role).unwrap_or(TurnRole::System),
            content: row.get(3)?,
            created_at: row.get(4)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::PatternSignalDetector;
    use tempfile::tempdir;

    const T0: i64 = 1_700_000_000_000;

    fn new_session(db: &Database) -> Session {
        db.create_session(
            &NewSession {
                user_id: "user-1".to_string(),
                goal: "Learn about platform teams".to_string(),
                target_profile_context: None,
                custom_context: None,
            },
            T0,
        )
        .unwrap()
    }

    #[test]
    fn test_open_path_creates_database() {
        let temp = tempdir().expect("Failed to create temp dir");
        let db_path = temp.path().join("coach.db");
        assert!(!db_path.exists());

        let db = Database::open_path(&db_path).expect("Failed to open database");
        assert!(db_path.exists());
        assert!(db.ping().is_ok());

        // Schema creation is idempotent
        drop(db);
        assert!(Database::open_path(&db_path).is_ok());
    }

    #[test]
    fn test_create_session_defaults() {
        let db = Database::open_in_memory().unwrap();
        let session = new_session(&db);

        assert_eq!(session.status, SessionStatus::Active);
        assert_eq!(session.stage, Stage::SmallTalk);
        assert_eq!(session.stage_entered_at, T0);
        assert_eq!(session.stage_user_turns, 0);
        assert!(session.stage_signals.is_empty());
        assert!(session.target_profile_context.starts_with("Default networking context"));
        assert!(session.talk_nudges.is_empty());
        assert!(session.ended_at.is_none());
    }

    #[test]
    fn test_custom_context_suppresses_default_target() {
        let db = Database::open_in_memory().unwrap();
        let session = db
            .create_session(
                &NewSession {
                    user_id: "user-1".to_string(),
                    goal: "goal".to_string(),
                    target_profile_context: Some("  ".to_string()),
                    custom_context: Some(" practice a cold intro ".to_string()),
                },
                T0,
            )
            .unwrap();
        assert_eq!(session.target_profile_context, "");
        assert_eq!(session.custom_context, "practice a cold intro");
        assert_eq!(session.context_summary(), "practice a cold intro");
    }

    #[test]
    fn test_append_turn_updates_bookkeeping_for_user_only() {
        let db = Database::open_in_memory().unwrap();
        let detector = PatternSignalDetector::default();
        let session = new_session(&db);

        let appended = db
            .append_turn(&session.id, TurnRole::Assistant, "Hi, I'm a recruiter", &detector, T0 + 1)
            .unwrap();
        assert_eq!(appended.session.stage_user_turns, 0);
        assert!(appended.session.stage_signals.is_empty());

        let appended = db
            .append_turn(&session.id, TurnRole::User, "I'm a student at MIT", &detector, T0 + 2)
            .unwrap();
        assert_eq!(appended.session.stage_user_turns, 1);
        assert!(appended.session.stage_signals.has_intro_or_context);
        assert_eq!(appended.session.stage, Stage::SmallTalk);
        assert_eq!(appended.session.updated_at, appended.turn.created_at);
    }

    #[test]
    fn test_append_turn_timestamps_strictly_increase() {
        let db = Database::open_in_memory().unwrap();
        let detector = PatternSignalDetector::default();
        let session = new_session(&db);

        let a = db.append_turn(&session.id, TurnRole::User, "one", &detector, T0).unwrap();
        let b = db.append_turn(&session.id, TurnRole::User, "two", &detector, T0).unwrap();
        let c = db.append_turn(&session.id, TurnRole::User, "three", &detector, T0 - 50).unwrap();

        assert!(a.turn.created_at < b.turn.created_at);
        assert!(b.turn.created_at < c.turn.created_at);

        let turns = db.get_turns(&session.id).unwrap();
        let contents: Vec<_> = turns.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
    }

    #[test]
    fn test_append_turn_unknown_session() {
        let db = Database::open_in_memory().unwrap();
        let detector = PatternSignalDetector::default();
        let err = db
            .append_turn("missing", TurnRole::User, "hello", &detector, T0)
            .unwrap_err();
        assert!(matches!(err, Error::SessionNotFound(_)));
    }

    #[test]
    fn test_stage_transition_applies_and_resets() {
        let db = Database::open_in_memory().unwrap();
        let detector = PatternSignalDetector::default();
        let session = new_session(&db);
        db.append_turn(&session.id, TurnRole::User, "I'm a student", &detector, T0 + 1_000)
            .unwrap();
        db.append_turn(
            &session.id,
            TurnRole::User,
            "my team builds infra",
            &detector,
            T0 + 2_000,
        )
        .unwrap();

        let now = T0 + 61_000;
        let outcome = db
            .request_stage_transition(&session.id, "projects", "assistant", "user asked", now)
            .unwrap();
        assert!(outcome.applied);
        assert_eq!(outcome.next_stage, Stage::Experience);
        assert!(outcome.reason.ends_with("(user asked)"));
        assert_eq!(outcome.session.stage, Stage::Experience);
        assert_eq!(outcome.session.stage_user_turns, 0);
        assert_eq!(outcome.session.stage_entered_at, now);
        assert!(outcome.session.stage_signals.is_empty());
    }

    #[test]
    fn test_stage_transition_held_by_policy_leaves_state() {
        let db = Database::open_in_memory().unwrap();
        let detector = PatternSignalDetector::default();
        let session = new_session(&db);
        db.append_turn(&session.id, TurnRole::User, "I'm a student", &detector, T0 + 1_000)
            .unwrap();
        let before = db.get_session(&session.id).unwrap().unwrap();

        let outcome = db
            .request_stage_transition(&session.id, "EXPERIENCE", "assistant", "", T0 + 5_000)
            .unwrap();
        assert!(!outcome.applied);
        assert_eq!(outcome.next_stage, Stage::SmallTalk);
        assert!(outcome.reason.starts_with("Stage policy not satisfied"));
        assert_eq!(db.get_session(&session.id).unwrap().unwrap(), before);
    }

    #[test]
    fn test_stage_transition_multi_jump_rejected() {
        let db = Database::open_in_memory().unwrap();
        let session = new_session(&db);
        let outcome = db
            .request_stage_transition(&session.id, "ADVICE", "assistant", "", T0 + 600_000)
            .unwrap();
        assert!(!outcome.applied);
        assert_eq!(outcome.reason, "Only one-stage forward transition is allowed");
    }

    #[test]
    fn test_finalize_is_idempotent_for_ended_at() {
        let db = Database::open_in_memory().unwrap();
        let session = new_session(&db);

        let first = db.finalize_session(&session.id, T0 + 10).unwrap();
        assert!(first.started);
        assert_eq!(first.session.status, SessionStatus::ProcessingEvaluation);
        assert_eq!(first.session.ended_at, Some(T0 + 10));

        let second = db.finalize_session(&session.id, T0 + 20).unwrap();
        assert!(!second.started);
        assert_eq!(second.session.ended_at, Some(T0 + 10));

        db.mark_evaluation_failed(&session.id, T0 + 30).unwrap();
        let third = db.finalize_session(&session.id, T0 + 40).unwrap();
        assert!(third.started);
        assert_eq!(third.session.status, SessionStatus::ProcessingEvaluation);
        assert_eq!(third.session.ended_at, Some(T0 + 10));
    }

    #[test]
    fn test_evaluation_upsert_overwrites() {
        let db = Database::open_in_memory().unwrap();
        let session = new_session(&db);
        let mut evaluation = NewEvaluation {
            score: 6,
            strengths: vec!["warm opener".into()],
            improvements: vec![],
            next_actions: vec!["ask for a referral".into()],
            follow_up_email: "Hi".into(),
        };

        db.save_evaluation(&session.id, &evaluation, T0).unwrap().unwrap();
        evaluation.score = 9;
        let (stored, session) = db
            .save_evaluation(&session.id, &evaluation, T0 + 5)
            .unwrap()
            .unwrap();

        assert_eq!(stored.score, 9);
        assert_eq!(stored.created_at, T0 + 5);
        assert_eq!(session.status, SessionStatus::Evaluated);
    }

    #[test]
    fn test_delete_cascades() {
        let db = Database::open_in_memory().unwrap();
        let detector = PatternSignalDetector::default();
        let session = new_session(&db);
        db.append_turn(&session.id, TurnRole::User, "hello", &detector, T0).unwrap();
        db.save_evaluation(
            &session.id,
            &NewEvaluation {
                score: 5,
                strengths: vec![],
                improvements: vec![],
                next_actions: vec![],
                follow_up_email: String::new(),
            },
            T0,
        )
        .unwrap();

        assert_eq!(db.delete_session(&session.id).unwrap(), "user-1");
        assert!(db.get_session(&session.id).unwrap().is_none());
        assert!(db.get_turns(&session.id).unwrap().is_empty());
        assert!(db.get_evaluation(&session.id).unwrap().is_none());
        assert!(matches!(
            db.delete_session(&session.id),
            Err(Error::SessionNotFound(_))
        ));
    }

    #[test]
    fn test_turn_windows() {
        let db = Database::open_in_memory().unwrap();
        let detector = PatternSignalDetector::default();
        let session = new_session(&db);
        for i in 0..5 {
            db.append_turn(&session.id, TurnRole::User, &format!("turn {i}"), &detector, T0 + i)
                .unwrap();
        }

        let recent = db.list_recent_turns(&session.id, 2).unwrap();
        assert_eq!(recent[0].content, "turn 3");
        assert_eq!(recent[1].content, "turn 4");

        let after = db.list_turns_after(&session.id, T0 + 1, 2).unwrap();
        assert_eq!(after.len(), 2);
        assert_eq!(after[0].content, "turn 2");
    }

    #[test]
    fn test_derived_updates_on_missing_session() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.save_talk_nudges("missing", &["a".into()], T0).unwrap().is_none());
        assert!(db.save_conversation_summary("missing", "s", None, T0).unwrap().is_none());
    }

    #[test]
    fn test_summary_cursor_kept_when_absent() {
        let db = Database::open_in_memory().unwrap();
        let session = new_session(&db);
        db.save_conversation_summary(&session.id, "first", Some(T0 + 5), T0 + 6).unwrap();
        let updated = db
            .save_conversation_summary(&session.id, "second", None, T0 + 7)
            .unwrap()
            .unwrap();
        assert_eq!(updated.conversation_summary.as_deref(), Some("second"));
        assert_eq!(updated.summary_cursor_at, Some(T0 + 5));
    }
}

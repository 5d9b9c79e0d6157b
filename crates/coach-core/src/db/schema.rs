//! SQLite schema. Every statement is idempotent.

pub(super) const CREATE_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    goal TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'ACTIVE',
    target_profile_context TEXT NOT NULL DEFAULT '',
    custom_context TEXT NOT NULL DEFAULT '',
    stage_state TEXT,
    stage_entered_at INTEGER NOT NULL DEFAULT 0,
    stage_user_turns INTEGER NOT NULL DEFAULT 0,
    stage_signal_flags TEXT NOT NULL DEFAULT '{}',
    conversation_summary TEXT,
    summary_cursor_at INTEGER,
    talk_nudges TEXT NOT NULL DEFAULT '[]',
    nudges_updated_at INTEGER,
    display_title TEXT,
    goal_summary TEXT,
    metadata_updated_at INTEGER,
    followup_draft TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    ended_at INTEGER
);

CREATE INDEX IF NOT EXISTS idx_sessions_user_updated ON sessions (user_id, updated_at DESC);
CREATE INDEX IF NOT EXISTS idx_sessions_status ON sessions (status);

CREATE TABLE IF NOT EXISTS session_turns (
    id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL REFERENCES sessions (id) ON DELETE CASCADE,
    role TEXT NOT NULL,
    content TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_turns_session_created ON session_turns (session_id, created_at);

CREATE TABLE IF NOT EXISTS session_evaluations (
    session_id TEXT PRIMARY KEY REFERENCES sessions (id) ON DELETE CASCADE,
    score INTEGER NOT NULL,
    strengths TEXT NOT NULL DEFAULT '[]',
    improvements TEXT NOT NULL DEFAULT '[]',
    next_actions TEXT NOT NULL DEFAULT '[]',
    follow_up_email TEXT NOT NULL DEFAULT '',
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS vocabulary_entries (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    text TEXT NOT NULL,
    definition TEXT NOT NULL,
    example TEXT NOT NULL DEFAULT '',
    example_trans TEXT NOT NULL DEFAULT '',
    real_life_def TEXT NOT NULL DEFAULT '',
    surrounding_text TEXT NOT NULL DEFAULT '',
    video_title TEXT NOT NULL DEFAULT '',
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_vocabulary_user ON vocabulary_entries (user_id, created_at DESC);

CREATE TABLE IF NOT EXISTS vocabulary_cards (
    vocabulary_id TEXT PRIMARY KEY REFERENCES vocabulary_entries (id) ON DELETE CASCADE,
    user_id TEXT NOT NULL,
    difficulty REAL NOT NULL DEFAULT 0,
    stability REAL NOT NULL DEFAULT 0,
    due_at INTEGER NOT NULL,
    state INTEGER NOT NULL DEFAULT 0,
    last_review_at INTEGER NOT NULL DEFAULT 0,
    reps INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_cards_user_due ON vocabulary_cards (user_id, due_at);
"#;

/// SQL DDL for the lore database.
/// WAL mode + foreign keys enabled at connection time.
pub const SCHEMA_VERSION: u32 = 1;

pub const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS suggestions (
    id TEXT PRIMARY KEY,
    team_id TEXT NOT NULL,
    source_type TEXT NOT NULL,
    knowledge_type TEXT NOT NULL,
    title TEXT NOT NULL,
    current_content TEXT NOT NULL DEFAULT '',
    proposed_content TEXT NOT NULL DEFAULT '',
    confidence REAL NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    source_link TEXT NOT NULL,
    target_page TEXT,
    created_at TEXT NOT NULL,
    decided_at TEXT,
    decided_by TEXT
);

CREATE TABLE IF NOT EXISTS activity (
    id TEXT PRIMARY KEY,
    suggestion_id TEXT NOT NULL REFERENCES suggestions(id),
    resulting_status TEXT NOT NULL,
    title TEXT NOT NULL,
    source_type TEXT NOT NULL,
    actor_name TEXT,
    occurred_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS team_usage (
    team_id TEXT PRIMARY KEY,
    plan TEXT NOT NULL,
    suggestions_used INTEGER NOT NULL DEFAULT 0,
    suggestions_limit INTEGER,
    seats_used INTEGER NOT NULL DEFAULT 0,
    seats_limit INTEGER,
    sources_connected INTEGER NOT NULL DEFAULT 0,
    sources_limit INTEGER,
    trial_ends_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_suggestions_status ON suggestions(status);
CREATE INDEX IF NOT EXISTS idx_suggestions_team ON suggestions(team_id);
CREATE INDEX IF NOT EXISTS idx_suggestions_dedupe ON suggestions(source_link, knowledge_type);
CREATE INDEX IF NOT EXISTS idx_activity_suggestion ON activity(suggestion_id);
CREATE INDEX IF NOT EXISTS idx_activity_occurred ON activity(occurred_at);

CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);
"#;

pub const PRAGMAS: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
PRAGMA busy_timeout = 5000;
PRAGMA synchronous = NORMAL;
"#;

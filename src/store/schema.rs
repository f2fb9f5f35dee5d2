//! SQLite schema definition
//!
//! - turns: one row per enriched turn, UNIQUE(session_id, turn)
//! - turns_fts: external-content FTS5 index over turns.original_text, synced by triggers
//! - turn_embeddings: one vector per (turn, model) with the hash of the embedded text
//! - combined_turns: view pairing each user turn with the assistant turn right after it
//! - code_metrics: one row per (request, file), repeated edits folded together
//! - workspace_info: last extraction per workspace

pub const SCHEMA: &str = r#"
-- ============================================
-- TURNS
-- ============================================

-- AUTOINCREMENT keeps ids of replaced rows from being reused
CREATE TABLE IF NOT EXISTS turns (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    turn INTEGER NOT NULL,
    role TEXT NOT NULL,                    -- 'user' | 'assistant'
    text TEXT,                             -- cleaned text
    original_text TEXT,

    workspace_id TEXT,
    workspace_name TEXT,
    workspace_folder TEXT,
    session_name TEXT,
    agent_used TEXT,
    model_id TEXT,
    request_id TEXT,
    merged_request_ids TEXT,               -- JSON array

    timestamp_ms INTEGER,
    timestamp_iso TEXT,
    ts TEXT,

    original_text_tokens INTEGER DEFAULT 0,
    cleaned_text_tokens INTEGER DEFAULT 0,
    code_tokens INTEGER DEFAULT 0,
    tool_tokens INTEGER DEFAULT 0,
    system_tokens INTEGER DEFAULT 0,
    thinking_tokens INTEGER DEFAULT 0,
    session_history_tokens INTEGER DEFAULT 0,

    thinking_text TEXT,
    thinking_duration_ms INTEGER,

    primary_language TEXT,
    languages TEXT,                        -- JSON array
    files TEXT,                            -- JSON array
    tools TEXT,                            -- JSON array

    responding_to_turn INTEGER,
    response_time_ms INTEGER,

    total_lines_added INTEGER,
    total_lines_removed INTEGER,
    total_nloc_change INTEGER,
    weighted_complexity_change REAL,

    UNIQUE(session_id, turn)
);

CREATE INDEX IF NOT EXISTS idx_turns_workspace ON turns(workspace_id);
CREATE INDEX IF NOT EXISTS idx_turns_workspace_session ON turns(workspace_id, session_id);
CREATE INDEX IF NOT EXISTS idx_turns_role ON turns(role);
CREATE INDEX IF NOT EXISTS idx_turns_timestamp ON turns(timestamp_ms);
CREATE INDEX IF NOT EXISTS idx_turns_request ON turns(request_id);
CREATE INDEX IF NOT EXISTS idx_turns_agent ON turns(agent_used);

-- ============================================
-- KEYWORD INDEX
-- ============================================

CREATE VIRTUAL TABLE IF NOT EXISTS turns_fts USING fts5(
    original_text,
    content='turns',
    content_rowid='id',
    tokenize='unicode61'
);

CREATE TRIGGER IF NOT EXISTS turns_fts_ai AFTER INSERT ON turns BEGIN
    INSERT INTO turns_fts(rowid, original_text)
    VALUES (new.id, COALESCE(new.original_text, new.text, ''));
END;

CREATE TRIGGER IF NOT EXISTS turns_fts_ad AFTER DELETE ON turns BEGIN
    INSERT INTO turns_fts(turns_fts, rowid, original_text)
    VALUES ('delete', old.id, COALESCE(old.original_text, old.text, ''));
END;

CREATE TRIGGER IF NOT EXISTS turns_fts_au AFTER UPDATE OF original_text, text ON turns BEGIN
    INSERT INTO turns_fts(turns_fts, rowid, original_text)
    VALUES ('delete', old.id, COALESCE(old.original_text, old.text, ''));
    INSERT INTO turns_fts(rowid, original_text)
    VALUES (new.id, COALESCE(new.original_text, new.text, ''));
END;

-- ============================================
-- SEMANTIC INDEX
-- ============================================

CREATE TABLE IF NOT EXISTS turn_embeddings (
    turn_id INTEGER NOT NULL,
    model TEXT NOT NULL,
    dims INTEGER NOT NULL,
    embedding BLOB NOT NULL,               -- little-endian f32
    text_hash TEXT NOT NULL,               -- sha256 of the trimmed text
    updated_at TEXT DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY (turn_id, model),
    FOREIGN KEY (turn_id) REFERENCES turns(id)
);

CREATE INDEX IF NOT EXISTS idx_turn_embeddings_model ON turn_embeddings(model);

-- ============================================
-- CODE METRICS
-- ============================================

CREATE TABLE IF NOT EXISTS code_metrics (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    request_id TEXT NOT NULL,
    session_id TEXT,
    file_path TEXT NOT NULL,
    workspace_id TEXT,
    agent_used TEXT,
    model_id TEXT,
    delta_nloc INTEGER,
    delta_complexity REAL,
    lines_added INTEGER,
    lines_removed INTEGER,
    before_metrics TEXT,                   -- JSON
    after_metrics TEXT,                    -- JSON
    delta_metrics TEXT,                    -- JSON
    code_before TEXT,
    code_after TEXT,
    created_at TEXT DEFAULT CURRENT_TIMESTAMP,
    UNIQUE(request_id, file_path)
);

CREATE INDEX IF NOT EXISTS idx_code_metrics_workspace ON code_metrics(workspace_id);
CREATE INDEX IF NOT EXISTS idx_code_metrics_session ON code_metrics(session_id);

-- ============================================
-- WORKSPACES
-- ============================================

-- created_at = first extraction, updated_at = last extraction
CREATE TABLE IF NOT EXISTS workspace_info (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    workspace_id TEXT NOT NULL UNIQUE,
    workspace_name TEXT,
    workspace_folder TEXT,
    agent_used TEXT,                       -- 'copilot', 'claude_code+cursor', ...
    extraction_duration_ms INTEGER,
    session_count INTEGER DEFAULT 0,
    turn_count INTEGER DEFAULT 0,
    total_code_loc INTEGER DEFAULT 0,
    total_doc_loc INTEGER DEFAULT 0,
    created_at TEXT DEFAULT CURRENT_TIMESTAMP,
    updated_at TEXT DEFAULT CURRENT_TIMESTAMP
);

-- ============================================
-- COMBINED EXCHANGES
-- ============================================

CREATE VIEW IF NOT EXISTS combined_turns AS
WITH sequenced AS (
    SELECT t.*,
           LEAD(t.turn) OVER (PARTITION BY t.session_id ORDER BY t.turn) AS next_turn,
           LEAD(t.role) OVER (PARTITION BY t.session_id ORDER BY t.turn) AS next_role
    FROM turns t
),
user_turns AS (
    SELECT *, ROW_NUMBER() OVER (PARTITION BY session_id ORDER BY turn) - 1 AS exchange_index
    FROM sequenced
    WHERE role = 'user'
)
SELECT
    u.session_id || '_' || u.exchange_index AS id,
    u.session_id,
    u.workspace_id,
    u.exchange_index,
    u.turn AS user_turn_number,
    a.turn AS assistant_turn_number,
    u.workspace_name,
    u.workspace_folder,
    u.session_name,
    u.agent_used,
    u.text AS user_cleaned_text,
    u.original_text AS user_original_text,
    u.timestamp_ms AS user_timestamp_ms,
    COALESCE(a.text, '') AS assistant_cleaned_text,
    COALESCE(a.original_text, '') AS assistant_original_text,
    COALESCE(a.tools, '[]') AS assistant_tools,
    a.timestamp_ms AS assistant_timestamp_ms,
    a.response_time_ms,
    COALESCE(a.total_lines_added, 0) AS total_lines_added,
    COALESCE(a.total_lines_removed, 0) AS total_lines_removed,
    COALESCE(a.total_nloc_change, 0) AS total_nloc_change,
    COALESCE(a.weighted_complexity_change, 0.0) AS weighted_complexity_change,
    COALESCE(a.model_id, u.model_id) AS model_id
FROM user_turns u
LEFT JOIN turns a
    ON a.session_id = u.session_id
    AND a.turn = u.next_turn
    AND u.next_role = 'assistant';
"#;

//! SQL DDL for the base mnemos tables.
//!
//! Defines `memories`, `memory_log` and `schema_meta`. Later tables arrive through
//! [`migrations`](super::migrations). All DDL uses `IF NOT EXISTS`.

use rusqlite::Connection;

const SCHEMA_SQL: &str = r#"
-- Memories with their live score
CREATE TABLE IF NOT EXISTS memories (
    id TEXT PRIMARY KEY,
    content TEXT NOT NULL,
    tags TEXT NOT NULL DEFAULT '[]',
    score REAL NOT NULL,
    created_at TEXT NOT NULL,
    last_reinforced TEXT
);

CREATE INDEX IF NOT EXISTS idx_memories_score ON memories(score);

-- Audit log
CREATE TABLE IF NOT EXISTS memory_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    operation TEXT NOT NULL CHECK(operation IN ('create','reinforce','recalculate','delete','method')),
    memory_id TEXT NOT NULL,
    details TEXT,
    created_at TEXT NOT NULL
);

-- Schema metadata
CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Initialize the base tables. Idempotent.
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    // Set initial schema version if not already present
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', '1')",
        [],
    )?;

    Ok(())
}

//! [`Persistence`] over a single SQLite connection.
//!
//! Every write runs in a transaction together with its `memory_log` audit row.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::migrations;
use crate::memory::persist::{Persistence, ScoreOperation, StoredCorpus};
use crate::memory::scores::ScoreUpdate;
use crate::memory::types::Memory;

pub struct SqlitePersistence {
    conn: Mutex<Connection>,
}

impl SqlitePersistence {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::from_connection(super::open_database(path)?))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from_connection(super::open_memory_database()?))
    }

    /// Wrap an already initialized and migrated connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| anyhow!("database lock poisoned: {e}"))
    }
}

impl Persistence for SqlitePersistence {
    fn load(&self) -> Result<StoredCorpus> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, content, tags, score, created_at, last_reinforced
             FROM memories ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(MemoryRow {
                id: row.get(0)?,
                content: row.get(1)?,
                tags: row.get(2)?,
                score: row.get(3)?,
                created_at: row.get(4)?,
                last_reinforced: row.get(5)?,
            })
        })?;

        let mut memories = Vec::new();
        for row in rows {
            memories.push(row?.into_memory()?);
        }
        let method = migrations::get_vectorizer_method(&conn)?;

        tracing::debug!(memories = memories.len(), method = ?method, "corpus loaded from database");
        Ok(StoredCorpus { memories, method })
    }

    fn save_memory(&self, memory: &Memory) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO memories (id, content, tags, score, created_at, last_reinforced)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                content = excluded.content,
                tags = excluded.tags,
                score = excluded.score,
                last_reinforced = excluded.last_reinforced",
            params![
                memory.id,
                memory.content,
                serde_json::to_string(&memory.tags)?,
                memory.score,
                memory.created_at.to_rfc3339(),
                memory.last_reinforced.map(|t| t.to_rfc3339()),
            ],
        )?;
        write_audit_log(
            &tx,
            "create",
            &memory.id,
            Some(&serde_json::json!({"tags": memory.tags, "score": memory.score})),
        )?;
        tx.commit()?;
        Ok(())
    }

    fn delete_memory(&self, id: &str) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM memory_vectors WHERE memory_id = ?1", [id])?;
        let deleted = tx.execute("DELETE FROM memories WHERE id = ?1", [id])?;
        write_audit_log(&tx, "delete", id, None)?;
        tx.commit()?;
        if deleted == 0 {
            tracing::warn!(id, "deleted memory was not in the database");
        }
        Ok(())
    }

    fn save_scores(&self, operation: ScoreOperation, updates: &[ScoreUpdate]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt =
                tx.prepare("UPDATE memories SET score = ?1, last_reinforced = ?2 WHERE id = ?3")?;
            for update in updates {
                stmt.execute(params![
                    update.score,
                    update.last_reinforced.map(|t| t.to_rfc3339()),
                    update.id,
                ])?;
            }
        }

        match operation {
            ScoreOperation::Reinforce => {
                for update in updates {
                    write_audit_log(
                        &tx,
                        operation.as_str(),
                        &update.id,
                        Some(&serde_json::json!({"score": update.score})),
                    )?;
                }
            }
            // one row for the whole reset
            ScoreOperation::Recalculate => write_audit_log(
                &tx,
                operation.as_str(),
                "batch:recalculate",
                Some(&serde_json::json!({"memories": updates.len()})),
            )?,
        }

        tx.commit()?;
        Ok(())
    }

    fn save_method(&self, method: &str) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        migrations::set_vectorizer_method(&tx, method)?;
        write_audit_log(
            &tx,
            "method",
            "batch:method",
            Some(&serde_json::json!({"method": method})),
        )?;
        tx.commit()?;
        Ok(())
    }

    fn load_vectors(&self, method: &str) -> Result<HashMap<String, Vec<f32>>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT memory_id, dims, data FROM memory_vectors WHERE method = ?1")?;
        let rows = stmt.query_map([method], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, Vec<u8>>(2)?,
            ))
        })?;

        let mut vectors = HashMap::new();
        for row in rows {
            let (id, dims, data) = row?;
            match bytes_to_vector(&data) {
                Some(v) if v.len() as i64 == dims => {
                    vectors.insert(id, v);
                }
                _ => tracing::warn!(id = %id, method, dims, bytes = data.len(), "skipping malformed cached vector"),
            }
        }
        Ok(vectors)
    }

    fn save_vectors(&self, method: &str, vectors: &[(String, Vec<f32>)]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO memory_vectors (memory_id, method, dims, data)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (id, vector) in vectors {
                stmt.execute(params![id, method, vector.len() as i64, vector_to_bytes(vector)])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

struct MemoryRow {
    id: String,
    content: String,
    tags: String,
    score: f64,
    created_at: String,
    last_reinforced: Option<String>,
}

impl MemoryRow {
    fn into_memory(self) -> Result<Memory> {
        let tags: Vec<String> = serde_json::from_str(&self.tags)
            .with_context(|| format!("invalid tags for memory {}", self.id))?;
        let created_at = parse_timestamp(&self.created_at)
            .with_context(|| format!("invalid created_at for memory {}", self.id))?;
        let last_reinforced = self
            .last_reinforced
            .as_deref()
            .map(parse_timestamp)
            .transpose()
            .with_context(|| format!("invalid last_reinforced for memory {}", self.id))?;
        Ok(Memory {
            id: self.id,
            content: self.content,
            tags,
            created_at,
            score: self.score,
            last_reinforced,
        })
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)?.with_timezone(&Utc))
}

/// Little-endian `f32` encoding used for the `memory_vectors.data` column.
fn vector_to_bytes(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|x| x.to_le_bytes()).collect()
}

fn bytes_to_vector(data: &[u8]) -> Option<Vec<f32>> {
    if data.len() % 4 != 0 {
        return None;
    }
    Some(
        data.chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    )
}

/// Write an entry to the `memory_log` audit table.
pub(crate) fn write_audit_log(
    conn: &Connection,
    operation: &str,
    memory_id: &str,
    details: Option<&serde_json::Value>,
) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    let details_json = details.map(|d| d.to_string());
    conn.execute(
        "INSERT INTO memory_log (operation, memory_id, details, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![operation, memory_id, details_json, now],
    )?;
    Ok(())
}

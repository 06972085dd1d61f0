//! Durability seam between the engine and a storage backend.
//!
//! The in-memory engine state is authoritative. Implementations are called after
//! that state has changed and must not assume they can veto the change.

use std::collections::HashMap;

use anyhow::Result;

use super::scores::ScoreUpdate;
use super::types::Memory;

/// Everything needed to rebuild an engine at startup.
#[derive(Debug, Default)]
pub struct StoredCorpus {
    pub memories: Vec<Memory>,
    /// Vectorizer method the stored corpus was last indexed with.
    pub method: Option<String>,
}

/// Which engine operation produced a score write, recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreOperation {
    Reinforce,
    Recalculate,
}

impl ScoreOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reinforce => "reinforce",
            Self::Recalculate => "recalculate",
        }
    }
}

pub trait Persistence: Send + Sync {
    fn load(&self) -> Result<StoredCorpus>;

    fn save_memory(&self, memory: &Memory) -> Result<()>;

    fn delete_memory(&self, id: &str) -> Result<()>;

    /// Write a batch of score changes atomically.
    fn save_scores(&self, operation: ScoreOperation, updates: &[ScoreUpdate]) -> Result<()>;

    fn save_method(&self, method: &str) -> Result<()>;

    /// Cached dense vectors for `method`, keyed by memory id.
    fn load_vectors(&self, method: &str) -> Result<HashMap<String, Vec<f32>>>;

    fn save_vectors(&self, method: &str, vectors: &[(String, Vec<f32>)]) -> Result<()>;
}

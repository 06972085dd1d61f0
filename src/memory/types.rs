//! Core record types.
//!
//! A [`Memory`] is the external view of a stored text unit: its immutable
//! [`MemoryRecord`] joined with the [`ScoreState`] owned by the score store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Immutable part of a memory, fixed at ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// UUID v7 (time-sortable), stable for the memory's lifetime.
    pub id: String,
    /// Raw text content.
    pub content: String,
    /// Tags in insertion order, deduplicated. Matching ignores order.
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Mutable score of one memory.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreState {
    pub score: f64,
    /// `None` until the memory is first reinforced.
    pub last_reinforced: Option<DateTime<Utc>>,
}

/// A memory with its current score, as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    pub id: String,
    pub content: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_reinforced: Option<DateTime<Utc>>,
}

impl Memory {
    pub fn from_parts(record: &MemoryRecord, state: ScoreState) -> Self {
        Self {
            id: record.id.clone(),
            content: record.content.clone(),
            tags: record.tags.clone(),
            created_at: record.created_at,
            score: state.score,
            last_reinforced: state.last_reinforced,
        }
    }

    pub fn record(&self) -> MemoryRecord {
        MemoryRecord {
            id: self.id.clone(),
            content: self.content.clone(),
            tags: self.tags.clone(),
            created_at: self.created_at,
        }
    }

    pub fn state(&self) -> ScoreState {
        ScoreState {
            score: self.score,
            last_reinforced: self.last_reinforced,
        }
    }

    /// `true` if every tag in `required` is carried by this memory.
    pub fn has_tags(&self, required: &[String]) -> bool {
        required.iter().all(|t| self.tags.iter().any(|own| own == t))
    }
}

/// Trim, drop empties and deduplicate tags, keeping first occurrences in order.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.as_ref().trim();
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    out
}

/// Tie-break shared by every ranked listing: more recently reinforced first
/// (never-reinforced last), then identifier ascending.
pub fn tie_break(a: &Memory, b: &Memory) -> Ordering {
    b.last_reinforced
        .cmp(&a.last_reinforced)
        .then_with(|| a.id.cmp(&b.id))
}

/// Order by score descending, then [`tie_break`].
pub fn by_score_desc(a: &Memory, b: &Memory) -> Ordering {
    b.score.total_cmp(&a.score).then_with(|| tie_break(a, b))
}

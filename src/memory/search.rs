use std::cmp::Ordering;

use serde::Serialize;

use super::corpus::CorpusSnapshot;
use super::types::{by_score_desc, tie_break, Memory};
use super::vectorizer::{similarity, Projected};
use crate::config::{RecallStrength, ScoringConfig};

// ── Public types ──────────────────────────────────────────────────────────────

/// A ranked query against the corpus.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    pub top_k: usize,
    pub min_relevance: f64,
    /// Only memories carrying every one of these tags are candidates.
    pub tags: Vec<String>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, top_k: usize, min_relevance: f64) -> Self {
        Self {
            query: query.into(),
            top_k,
            min_relevance,
            tags: Vec::new(),
        }
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Whitespace-only queries list the corpus instead of ranking it.
    pub fn is_listing(&self) -> bool {
        self.query.trim().is_empty()
    }
}

/// A single ranked result. `memory` shows the score from before this search's
/// reinforcement was applied.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub memory: Memory,
    pub relevance_score: f64,
    pub final_score: f64,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,
    /// Candidates that passed the relevance and tag filters, before `top_k`.
    pub total_matched: usize,
    /// Memories whose score moved: the results plus their neighbours.
    pub reinforced: usize,
    /// Set when the reinforcement was applied but could not be persisted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persistence_error: Option<String>,
}

/// Linear blend of relevance and stored score; non-decreasing in both.
#[derive(Debug, Clone, Copy)]
pub struct BlendWeights {
    pub relevance: f64,
    pub score: f64,
    pub score_scale: f64,
}

impl BlendWeights {
    pub fn from_config(config: &ScoringConfig) -> Self {
        Self {
            relevance: config.relevance_weight,
            score: config.score_weight,
            score_scale: config.score_scale,
        }
    }

    pub fn final_score(&self, relevance: f64, score: f64) -> f64 {
        self.relevance * relevance + self.score * (score / self.score_scale)
    }
}

impl Default for BlendWeights {
    fn default() -> Self {
        Self::from_config(&ScoringConfig::default())
    }
}

/// How much a search reinforces one recalled memory.
pub fn recall_strength(relevance: f64, config: &ScoringConfig) -> f64 {
    match config.recall_strength {
        RecallStrength::Relevance => relevance.clamp(0.0, 1.0),
        RecallStrength::Unit => config.unit_strength,
    }
}

// ── Ranking ───────────────────────────────────────────────────────────────────

/// Final score descending, then the shared recency/id tie-break.
pub fn by_final_score(a: &SearchHit, b: &SearchHit) -> Ordering {
    b.final_score
        .total_cmp(&a.final_score)
        .then_with(|| tie_break(&a.memory, &b.memory))
}

/// Candidates ranked against `query`, cut to `top_k`. Returns the snapshot index of
/// each kept hit alongside it, plus the number of candidates before the cut.
pub(crate) fn match_query(
    snapshot: &CorpusSnapshot,
    projected: &[Projected],
    query: &Projected,
    request: &SearchRequest,
    weights: BlendWeights,
) -> (Vec<(usize, SearchHit)>, usize) {
    let mut candidates: Vec<(usize, SearchHit)> = projected
        .iter()
        .enumerate()
        .filter_map(|(i, vector)| {
            let relevance = similarity(query, vector);
            if relevance < request.min_relevance {
                return None;
            }
            let memory = snapshot.memory(i);
            if !memory.has_tags(&request.tags) {
                return None;
            }
            let final_score = weights.final_score(relevance, memory.score);
            Some((
                i,
                SearchHit {
                    memory,
                    relevance_score: relevance,
                    final_score,
                },
            ))
        })
        .collect();

    let total = candidates.len();
    candidates.sort_by(|(_, a), (_, b)| by_final_score(a, b));
    candidates.truncate(request.top_k);

    tracing::debug!(
        candidates = projected.len(),
        matched = total,
        returned = candidates.len(),
        min_relevance = request.min_relevance,
        "query ranked"
    );
    (candidates, total)
}

/// The whole (tag-filtered) corpus ordered by stored score, relevance zero.
pub(crate) fn list_by_score(
    snapshot: &CorpusSnapshot,
    tags: &[String],
    weights: BlendWeights,
) -> Vec<SearchHit> {
    let mut memories: Vec<Memory> = (0..snapshot.len())
        .map(|i| snapshot.memory(i))
        .filter(|m| m.has_tags(tags))
        .collect();
    memories.sort_by(by_score_desc);
    memories
        .into_iter()
        .map(|memory| SearchHit {
            final_score: weights.final_score(0.0, memory.score),
            relevance_score: 0.0,
            memory,
        })
        .collect()
}

/// Truncate content to max_chars, appending "..." if truncated.
pub fn truncate_preview(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        content.to_string()
    } else {
        let end = content
            .char_indices()
            .nth(max_chars)
            .map_or(content.len(), |(i, _)| i);
        format!("{}...", &content[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn hit(id: &str, relevance: f64, score: f64) -> SearchHit {
        let weights = BlendWeights::default();
        SearchHit {
            memory: Memory {
                id: id.into(),
                content: String::new(),
                tags: vec![],
                created_at: Utc::now(),
                score,
                last_reinforced: None,
            },
            relevance_score: relevance,
            final_score: weights.final_score(relevance, score),
        }
    }

    #[test]
    fn blend_is_monotonic_in_both_inputs() {
        let w = BlendWeights::default();
        assert!(w.final_score(0.8, 1.0) > w.final_score(0.7, 1.0));
        assert!(w.final_score(0.5, 3.0) > w.final_score(0.5, 2.0));
        assert!((w.final_score(1.0, 100.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn ranking_breaks_ties_by_recency_then_id() {
        let mut hits = vec![hit("b", 0.5, 1.0), hit("a", 0.5, 1.0), hit("c", 0.9, 1.0)];
        hits[0].memory.last_reinforced = Some(Utc::now());
        hits.sort_by(by_final_score);
        let ids: Vec<&str> = hits.iter().map(|h| h.memory.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
    }

    #[test]
    fn recall_strength_follows_config() {
        let mut config = ScoringConfig::default();
        assert_eq!(recall_strength(0.42, &config), 0.42);
        assert_eq!(recall_strength(1.7, &config), 1.0);
        config.recall_strength = RecallStrength::Unit;
        assert_eq!(recall_strength(0.42, &config), 1.0);
    }

    #[test]
    fn listing_detects_blank_queries() {
        assert!(SearchRequest::new("  \n", 5, 0.2).is_listing());
        assert!(!SearchRequest::new("pizza", 5, 0.2).is_listing());
    }

    #[test]
    fn truncate_preview_respects_char_boundaries() {
        assert_eq!(truncate_preview("short", 10), "short");
        assert_eq!(truncate_preview("héllo wörld", 5), "héllo...");
    }
}

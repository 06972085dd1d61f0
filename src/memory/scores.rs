//! Per-memory scores and the reinforcement rules that move them.
//!
//! Scores change in exactly two ways: [`ScoreStore::apply`] adds a
//! [`ReinforcementBatch`], and [`ScoreStore::reset`] overwrites everything with
//! [`RecalculatedScores`] derived from a connection graph. Both need `&mut` and are
//! crate-private, so read paths cannot move a score.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::corpus::CorpusSnapshot;
use super::graph::{ConnectionGraph, Neighbor};
use super::types::ScoreState;

/// A persisted change to one memory's score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreUpdate {
    pub id: String,
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_reinforced: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct ScoreStore {
    states: HashMap<String, ScoreState>,
}

impl ScoreStore {
    pub fn get(&self, id: &str) -> Option<ScoreState> {
        self.states.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub(crate) fn insert(&mut self, id: String, state: ScoreState) {
        self.states.insert(id, state);
    }

    pub(crate) fn remove(&mut self, id: &str) -> Option<ScoreState> {
        self.states.remove(id)
    }

    /// Add every amount in `batch` once and stamp `last_reinforced`.
    /// Identifiers no longer present (deleted meanwhile) are skipped.
    pub(crate) fn apply(&mut self, batch: &ReinforcementBatch, at: DateTime<Utc>) -> Vec<ScoreUpdate> {
        batch
            .iter()
            .filter_map(|(id, amount)| {
                let state = self.states.get_mut(id)?;
                state.score += amount;
                state.last_reinforced = Some(at);
                Some(ScoreUpdate {
                    id: id.to_string(),
                    score: state.score,
                    last_reinforced: state.last_reinforced,
                })
            })
            .collect()
    }

    /// Replace every score with its recalculated value. Prior reinforcement is
    /// discarded; `last_reinforced` is left as is.
    pub(crate) fn reset(&mut self, recalculated: RecalculatedScores) -> Vec<ScoreUpdate> {
        let mut updates: Vec<ScoreUpdate> = self
            .states
            .iter_mut()
            .map(|(id, state)| {
                state.score = recalculated.get(id).unwrap_or(0.0);
                ScoreUpdate {
                    id: id.clone(),
                    score: state.score,
                    last_reinforced: state.last_reinforced,
                }
            })
            .collect();
        updates.sort_by(|a, b| a.id.cmp(&b.id));
        updates
    }
}

/// Reinforcement accumulated over one operation and applied in a single step.
///
/// A recalled memory receives its strength; each of its first-degree neighbours
/// receives `neighbor_share * strength`. A memory that is both recalled and a
/// neighbour of another recalled memory collects both amounts.
#[derive(Debug, Clone)]
pub struct ReinforcementBatch {
    neighbor_share: f64,
    amounts: BTreeMap<String, f64>,
}

impl ReinforcementBatch {
    pub fn new(neighbor_share: f64) -> Self {
        Self {
            neighbor_share,
            amounts: BTreeMap::new(),
        }
    }

    pub fn recall<'a, I>(&mut self, id: &str, strength: f64, neighbors: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        *self.amounts.entry(id.to_string()).or_insert(0.0) += strength;
        let share = strength * self.neighbor_share;
        for neighbor in neighbors.into_iter().filter(|n| *n != id) {
            *self.amounts.entry(neighbor.to_string()).or_insert(0.0) += share;
        }
    }

    pub fn amount(&self, id: &str) -> f64 {
        self.amounts.get(id).copied().unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.amounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.amounts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.amounts.iter().map(|(id, &a)| (id.as_str(), a))
    }
}

/// Edges at or above this similarity count triple.
const STRONG_EDGE: f64 = 0.7;
/// Edges at or above this similarity count double.
const MEDIUM_EDGE: f64 = 0.5;
const HUB_MIN_DEGREE: usize = 3;
const HUB_BONUS_PER_EDGE: f64 = 0.1;

/// Structural score of one node: weighted edge similarities, a hub bonus, and a
/// small bonus for substantive content.
pub fn graph_score(neighbors: &[Neighbor], word_count: usize) -> f64 {
    let edges: f64 = neighbors
        .iter()
        .map(|n| {
            let multiplier = if n.weight >= STRONG_EDGE {
                3.0
            } else if n.weight >= MEDIUM_EDGE {
                2.0
            } else {
                1.0
            };
            n.weight * multiplier
        })
        .sum();

    let hub = if neighbors.len() >= HUB_MIN_DEGREE {
        HUB_BONUS_PER_EDGE * neighbors.len() as f64
    } else {
        0.0
    };

    let length = match word_count {
        n if n >= 10 => 0.2,
        n if n >= 5 => 0.1,
        _ => 0.0,
    };

    edges + hub + length
}

/// Scores derived purely from a graph. The only input [`ScoreStore::reset`] accepts.
#[derive(Debug, Clone, PartialEq)]
pub struct RecalculatedScores {
    scores: BTreeMap<String, f64>,
}

impl RecalculatedScores {
    pub fn from_graph(snapshot: &CorpusSnapshot, graph: &ConnectionGraph) -> Self {
        let scores = snapshot
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                (
                    entry.record.id.clone(),
                    graph_score(graph.neighbors(i), entry.word_count),
                )
            })
            .collect();
        Self { scores }
    }

    pub fn get(&self, id: &str) -> Option<f64> {
        self.scores.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(ids: &[&str]) -> ScoreStore {
        let mut s = ScoreStore::default();
        for id in ids {
            s.insert(
                id.to_string(),
                ScoreState {
                    score: 1.0,
                    last_reinforced: None,
                },
            );
        }
        s
    }

    #[test]
    fn batch_shares_with_neighbors_once() {
        let mut batch = ReinforcementBatch::new(0.3);
        batch.recall("a", 1.0, ["c"]);
        batch.recall("b", 0.5, ["c", "a"]);
        assert!((batch.amount("a") - 1.15).abs() < 1e-12);
        assert!((batch.amount("c") - 0.3 * 1.5).abs() < 1e-12);
        assert_eq!(batch.amount("zzz"), 0.0);
    }

    #[test]
    fn self_is_not_a_neighbor() {
        let mut batch = ReinforcementBatch::new(0.3);
        batch.recall("a", 1.0, ["a"]);
        assert_eq!(batch.amount("a"), 1.0);
    }

    #[test]
    fn apply_skips_missing_and_stamps_time() {
        let mut s = store(&["a", "b"]);
        let mut batch = ReinforcementBatch::new(0.3);
        batch.recall("a", 2.0, ["gone"]);
        let now = Utc::now();
        let updates = s.apply(&batch, now);
        assert_eq!(updates.len(), 1);
        assert_eq!(s.get("a").unwrap().score, 3.0);
        assert_eq!(s.get("a").unwrap().last_reinforced, Some(now));
        assert_eq!(s.get("b").unwrap().last_reinforced, None);
    }

    #[test]
    fn graph_score_weights_edges_by_strength() {
        let n = |index, weight| Neighbor { index, weight };
        assert_eq!(graph_score(&[], 3), 0.0);
        assert!((graph_score(&[n(1, 0.8)], 0) - 2.4).abs() < 1e-12);
        assert!((graph_score(&[n(1, 0.5)], 5) - 1.1).abs() < 1e-12);
        // hub bonus kicks in at three edges
        let hub = graph_score(&[n(1, 0.4), n(2, 0.4), n(3, 0.4)], 10);
        assert!((hub - (1.2 + 0.3 + 0.2)).abs() < 1e-12);
    }

    #[test]
    fn reset_overwrites_reinforcement() {
        let mut s = store(&["a", "b"]);
        let mut batch = ReinforcementBatch::new(0.3);
        batch.recall("a", 5.0, Vec::<&str>::new());
        s.apply(&batch, Utc::now());

        let mut scores = BTreeMap::new();
        scores.insert("a".to_string(), 0.4);
        scores.insert("b".to_string(), 0.0);
        let updates = s.reset(RecalculatedScores { scores });
        assert_eq!(updates.len(), 2);
        assert_eq!(s.get("a").unwrap().score, 0.4);
        assert_eq!(s.get("b").unwrap().score, 0.0);
        assert!(s.get("a").unwrap().last_reinforced.is_some());
    }
}

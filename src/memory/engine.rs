//! The memory engine: one instance per process, shared by every request handler.
//!
//! All live state sits behind a single `RwLock`. Read paths (search ranking, network
//! views, listings) copy a [`CorpusSnapshot`] under the read lock and compute outside
//! it. Mutations take the write lock, apply one batch, then hand over to the
//! persistence gate so durable writes land in the same order as the in-memory ones.
//!
//! Two entry points build the similarity graph and they are kept apart on purpose:
//! [`MemoryEngine::compute_scores_and_connections`] borrows the state read-only,
//! while [`MemoryEngine::recalculate_all_scores`] is the only path that can reach
//! [`ScoreStore::reset`](super::scores::ScoreStore).

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use serde::Serialize;

use super::corpus::{vectorize_records, Corpus, CorpusSnapshot};
use super::graph::{build_graph, neighbor_row, ConnectionGraph, Threshold};
use super::persist::{Persistence, ScoreOperation};
use super::scores::{RecalculatedScores, ReinforcementBatch, ScoreStore, ScoreUpdate};
use super::search::{self, BlendWeights, SearchRequest, SearchResponse};
use super::similarity::SimilarityMatrix;
use super::types::{by_score_desc, normalize_tags, Memory, MemoryRecord, ScoreState};
use super::vectorizer::{MethodCatalog, Vectorizer};
use crate::config::ScoringConfig;
use crate::error::{EngineError, Result};

/// Memories considered by [`MemoryEngine::export_for_llm`] before packing.
const EXPORT_POOL: usize = 100;

struct EngineState {
    corpus: Corpus,
    scores: ScoreStore,
}

/// Read-only network view: nodes with their current scores, the thresholded
/// adjacency list and the full similarity matrix.
#[derive(Debug, Serialize)]
pub struct NetworkView {
    pub nodes: Vec<Memory>,
    pub graph: ConnectionGraph,
    pub matrix: SimilarityMatrix,
}

#[derive(Debug, Serialize)]
pub struct RecalculationReport {
    pub threshold: Threshold,
    pub edges: usize,
    pub scores: Vec<ScoreUpdate>,
}

/// A recalculation together with the network it was derived from.
#[derive(Debug, Serialize)]
pub struct RecalculatedNetwork {
    pub report: RecalculationReport,
    pub network: NetworkView,
}

#[derive(Debug, Serialize)]
pub struct Reinforcement {
    pub memory: Memory,
    /// First-degree neighbours that received a share.
    pub neighbors_reinforced: usize,
}

#[derive(Debug, Serialize)]
pub struct LlmExport {
    pub memories: Vec<Memory>,
    pub total_score: f64,
}

pub struct MemoryEngine {
    state: RwLock<EngineState>,
    catalog: MethodCatalog,
    scoring: ScoringConfig,
    threshold: Threshold,
    persistence: Option<Box<dyn Persistence>>,
    /// Held from the end of a mutation until its durable write finishes.
    persist_gate: Mutex<()>,
}

impl MemoryEngine {
    /// Engine with no durable storage.
    pub fn in_memory(catalog: MethodCatalog, method: &str, scoring: ScoringConfig) -> Result<Self> {
        scoring.validate()?;
        let vectorizer = Arc::new(catalog.instantiate(method)?);
        Self::assemble(catalog, scoring, Corpus::new(vectorizer), ScoreStore::default(), None)
    }

    /// Restore an engine from `persistence`.
    ///
    /// The stored vectorizer method wins over `method`; cached dense vectors for it
    /// are reused and only missing ones are computed.
    pub fn open(
        catalog: MethodCatalog,
        method: &str,
        scoring: ScoringConfig,
        persistence: Box<dyn Persistence>,
    ) -> Result<Self> {
        scoring.validate()?;
        let stored = persistence.load().map_err(EngineError::Persistence)?;

        let active = match stored.method.as_deref() {
            Some(saved) if saved != method => {
                tracing::warn!(
                    configured = method,
                    stored = saved,
                    "using the vectorizer method the corpus was indexed with"
                );
                saved.to_string()
            }
            Some(saved) => saved.to_string(),
            None => method.to_string(),
        };
        let vectorizer = Arc::new(catalog.instantiate(&active)?);

        let cached = if vectorizer.dimensions().is_some() {
            persistence
                .load_vectors(&active)
                .map_err(EngineError::Persistence)?
        } else {
            HashMap::new()
        };
        let records: Vec<MemoryRecord> = stored.memories.iter().map(Memory::record).collect();
        let (vectors, fresh) =
            vectorize_records(&vectorizer, &records, &cached).map_err(EngineError::Vectorizer)?;

        let mut corpus = Corpus::new(Arc::clone(&vectorizer));
        let mut scores = ScoreStore::default();
        for ((record, vector), memory) in records.into_iter().zip(vectors).zip(&stored.memories) {
            scores.insert(record.id.clone(), memory.state());
            corpus.insert(record, vector);
        }

        if !fresh.is_empty() {
            if let Err(e) = persistence.save_vectors(&active, &fresh) {
                tracing::warn!(error = %format!("{e:#}"), "failed to cache vectors");
            }
        }
        if stored.method.is_none() {
            persistence
                .save_method(&active)
                .map_err(EngineError::Persistence)?;
        }

        tracing::info!(memories = corpus.len(), method = %active, "engine loaded");
        Self::assemble(catalog, scoring, corpus, scores, Some(persistence))
    }

    fn assemble(
        catalog: MethodCatalog,
        scoring: ScoringConfig,
        corpus: Corpus,
        scores: ScoreStore,
        persistence: Option<Box<dyn Persistence>>,
    ) -> Result<Self> {
        let threshold = Threshold::new(scoring.connection_threshold)?;
        Ok(Self {
            state: RwLock::new(EngineState { corpus, scores }),
            catalog,
            scoring,
            threshold,
            persistence,
            persist_gate: Mutex::new(()),
        })
    }

    // ── Ingestion ─────────────────────────────────────────────────────────────

    /// Vectorize and index a new memory with the initial score.
    ///
    /// `method`, when given, must name the active vectorizer method.
    pub fn add_memory(&self, content: &str, tags: Vec<String>, method: Option<&str>) -> Result<Memory> {
        if content.trim().is_empty() {
            return Err(EngineError::InvalidInput("memory content is empty".into()));
        }

        let (vectorizer, generation) = {
            let state = self.read()?;
            (Arc::clone(state.corpus.vectorizer()), state.corpus.generation())
        };
        if let Some(requested) = method {
            self.check_active(requested, &vectorizer)?;
        }
        let mut vector = vectorizer
            .vectorize(content)
            .map_err(EngineError::Vectorizer)?;

        let record = MemoryRecord {
            id: uuid::Uuid::now_v7().to_string(),
            content: content.to_string(),
            tags: normalize_tags(tags),
            created_at: Utc::now(),
        };
        let state_entry = ScoreState {
            score: self.scoring.initial_score,
            last_reinforced: None,
        };

        let mut state = self.write()?;
        if state.corpus.generation() != generation {
            // the method changed while we were vectorizing
            let current = Arc::clone(state.corpus.vectorizer());
            if let Some(requested) = method {
                self.check_active(requested, &current)?;
            }
            vector = current.vectorize(content).map_err(EngineError::Vectorizer)?;
        }
        let method_name = state.corpus.vectorizer().name().to_string();
        let dense = vector.dense().map(<[f32]>::to_vec);

        state.corpus.insert(record.clone(), vector);
        state.scores.insert(record.id.clone(), state_entry);
        let memory = Memory::from_parts(&record, state_entry);

        tracing::info!(id = %memory.id, tags = ?memory.tags, method = %method_name, "memory stored");

        let _gate = self.handoff(state)?;
        self.persist("create", |p| {
            p.save_memory(&memory)?;
            if let Some(dense) = dense {
                p.save_vectors(&method_name, &[(memory.id.clone(), dense)])?;
            }
            Ok(())
        })?;
        Ok(memory)
    }

    fn check_active(&self, requested: &str, active: &Vectorizer) -> Result<()> {
        if requested == active.name() {
            return Ok(());
        }
        if !self.catalog.contains(requested) {
            return Err(EngineError::UnknownMethod {
                name: requested.to_string(),
                available: self.catalog.names(),
            });
        }
        Err(EngineError::InvalidConfiguration(format!(
            "memory requested method `{requested}` but the corpus is indexed with `{}`; switch methods first",
            active.name()
        )))
    }

    /// Remove a memory from the corpus, its scores and every derived structure.
    pub fn delete_memory(&self, id: &str) -> Result<Memory> {
        let mut state = self.write()?;
        let entry = state
            .corpus
            .remove(id)
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;
        let score = state.scores.remove(id).unwrap_or(ScoreState {
            score: 0.0,
            last_reinforced: None,
        });
        let memory = Memory::from_parts(&entry.record, score);

        tracing::info!(id = %id, remaining = state.corpus.len(), "memory deleted");

        let _gate = self.handoff(state)?;
        self.persist("delete", |p| p.delete_memory(id))?;
        Ok(memory)
    }

    // ── Reads ─────────────────────────────────────────────────────────────────

    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.corpus.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn get_memory(&self, id: &str) -> Result<Memory> {
        let state = self.read()?;
        let entry = state
            .corpus
            .get(id)
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;
        let score = state.scores.get(id).unwrap_or(ScoreState {
            score: 0.0,
            last_reinforced: None,
        });
        Ok(Memory::from_parts(&entry.record, score))
    }

    /// Every memory with its current score, in identifier (creation) order.
    pub fn get_all_memories_flat(&self) -> Result<Vec<Memory>> {
        let snapshot = self.snapshot()?;
        Ok((0..snapshot.len()).map(|i| snapshot.memory(i)).collect())
    }

    pub fn top_memories(&self, limit: usize) -> Result<Vec<Memory>> {
        let mut memories = self.get_all_memories_flat()?;
        memories.sort_by(by_score_desc);
        memories.truncate(limit);
        Ok(memories)
    }

    /// Highest-scoring memories packed in order until their JSON form would
    /// exceed `char_budget`.
    pub fn export_for_llm(&self, char_budget: usize) -> Result<LlmExport> {
        let mut used: usize = 0;
        let mut memories = Vec::new();
        for memory in self.top_memories(EXPORT_POOL)? {
            let size = serde_json::to_string(&memory).map_or(usize::MAX, |s| s.len());
            if used.saturating_add(size) > char_budget {
                break;
            }
            used += size;
            memories.push(memory);
        }
        let total_score = memories.iter().map(|m| m.score).sum();
        Ok(LlmExport {
            memories,
            total_score,
        })
    }

    /// Similarity matrix and connection graph at `threshold`. Never changes a score.
    pub fn compute_scores_and_connections(&self, threshold: f64) -> Result<NetworkView> {
        let threshold = Threshold::new(threshold)?;
        let snapshot = self.snapshot()?;
        let matrix = SimilarityMatrix::build(&snapshot);
        let graph = build_graph(&matrix, threshold);
        tracing::debug!(
            nodes = snapshot.len(),
            edges = graph.edge_count(),
            threshold = threshold.value(),
            "network computed"
        );
        Ok(NetworkView {
            nodes: (0..snapshot.len()).map(|i| snapshot.memory(i)).collect(),
            graph,
            matrix,
        })
    }

    // ── Search & reinforcement ────────────────────────────────────────────────

    /// Rank memories against the query and reinforce the results as one batch.
    ///
    /// A blank query lists the whole corpus by score (ignoring `top_k`) without
    /// reinforcing anything. Persistence failures do not fail the search; they are
    /// reported in [`SearchResponse::persistence_error`].
    pub fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        if !(0.0..=1.0).contains(&request.min_relevance) {
            return Err(EngineError::InvalidInput(format!(
                "min_relevance must be within [0, 1], got {}",
                request.min_relevance
            )));
        }

        let snapshot = self.snapshot()?;
        let weights = BlendWeights::from_config(&self.scoring);

        if request.is_listing() {
            let results = search::list_by_score(&snapshot, &request.tags, weights);
            return Ok(SearchResponse {
                total_matched: results.len(),
                results,
                reinforced: 0,
                persistence_error: None,
            });
        }
        if request.top_k == 0 || snapshot.is_empty() {
            return Ok(SearchResponse {
                results: Vec::new(),
                total_matched: 0,
                reinforced: 0,
                persistence_error: None,
            });
        }

        let query = snapshot
            .vectorizer
            .vectorize(&request.query)
            .map_err(EngineError::Vectorizer)?;
        let query = snapshot.space.project(&query);
        let projected = snapshot.project_all();
        let (hits, total_matched) =
            search::match_query(&snapshot, &projected, &query, request, weights);

        if hits.is_empty() {
            return Ok(SearchResponse {
                results: Vec::new(),
                total_matched,
                reinforced: 0,
                persistence_error: None,
            });
        }

        let mut batch = ReinforcementBatch::new(self.scoring.neighbor_share);
        for (index, hit) in &hits {
            let neighbors = neighbor_row(&projected, *index, self.threshold);
            batch.recall(
                &hit.memory.id,
                search::recall_strength(hit.relevance_score, &self.scoring),
                neighbors
                    .iter()
                    .map(|n| snapshot.entries[n.index].record.id.as_str()),
            );
        }

        let mut state = self.write()?;
        let updates = state.scores.apply(&batch, Utc::now());
        tracing::info!(
            results = hits.len(),
            reinforced = updates.len(),
            "search reinforced recalled memories"
        );

        let _gate = self.handoff(state)?;
        let persistence_error = self
            .persist("reinforce", |p| p.save_scores(ScoreOperation::Reinforce, &updates))
            .err()
            .map(|e| e.to_string());

        Ok(SearchResponse {
            results: hits.into_iter().map(|(_, hit)| hit).collect(),
            total_matched,
            reinforced: updates.len(),
            persistence_error,
        })
    }

    /// Add `strength` (default: the configured unit strength) to one memory and a
    /// share of it to each first-degree neighbour.
    pub fn reinforce(&self, id: &str, strength: Option<f64>) -> Result<Reinforcement> {
        let strength = strength.unwrap_or(self.scoring.unit_strength);
        if !strength.is_finite() || strength < 0.0 {
            return Err(EngineError::InvalidInput(format!(
                "reinforcement strength must be a non-negative number, got {strength}"
            )));
        }

        let mut state = self.write()?;
        let snapshot = state.corpus.snapshot(&state.scores);
        let index = snapshot
            .entries
            .iter()
            .position(|e| e.record.id == id)
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;
        let neighbors = neighbor_row(&snapshot.project_all(), index, self.threshold);

        let mut batch = ReinforcementBatch::new(self.scoring.neighbor_share);
        batch.recall(
            id,
            strength,
            neighbors
                .iter()
                .map(|n| snapshot.entries[n.index].record.id.as_str()),
        );
        let updates = state.scores.apply(&batch, Utc::now());
        let score = state.scores.get(id).unwrap_or(snapshot.entries[index].state);
        let memory = Memory::from_parts(&snapshot.entries[index].record, score);

        tracing::info!(
            id = %id,
            strength,
            score = memory.score,
            neighbors = neighbors.len(),
            "memory reinforced"
        );

        let _gate = self.handoff(state)?;
        self.persist("reinforce", |p| p.save_scores(ScoreOperation::Reinforce, &updates))?;
        Ok(Reinforcement {
            memory,
            neighbors_reinforced: neighbors.len(),
        })
    }

    /// Replace every score with one derived from the graph at `threshold`,
    /// discarding all accumulated reinforcement. Runs entirely under the write
    /// lock, so readers see either the old scores or the new ones.
    pub fn recalculate_all_scores(&self, threshold: f64) -> Result<RecalculationReport> {
        Ok(self.recalculate(threshold)?.report)
    }

    /// [`recalculate_all_scores`](Self::recalculate_all_scores) plus the network the
    /// new scores were derived from. No other write lands between the two.
    pub fn recalculate_scores_and_connections(&self, threshold: f64) -> Result<RecalculatedNetwork> {
        self.recalculate(threshold)
    }

    fn recalculate(&self, threshold: f64) -> Result<RecalculatedNetwork> {
        let threshold = Threshold::new(threshold)?;

        let mut state = self.write()?;
        let snapshot = state.corpus.snapshot(&state.scores);
        let matrix = SimilarityMatrix::build(&snapshot);
        let graph = build_graph(&matrix, threshold);
        let recalculated = RecalculatedScores::from_graph(&snapshot, &graph);
        let scores = state.scores.reset(recalculated);
        let reset = state.corpus.snapshot(&state.scores);
        let nodes = (0..reset.len()).map(|i| reset.memory(i)).collect();

        tracing::info!(
            memories = scores.len(),
            edges = graph.edge_count(),
            threshold = threshold.value(),
            "scores recalculated"
        );

        let _gate = self.handoff(state)?;
        self.persist("recalculate", |p| {
            p.save_scores(ScoreOperation::Recalculate, &scores)
        })?;
        Ok(RecalculatedNetwork {
            report: RecalculationReport {
                threshold,
                edges: graph.edge_count(),
                scores,
            },
            network: NetworkView {
                nodes,
                graph,
                matrix,
            },
        })
    }

    // ── Vectorizer methods ────────────────────────────────────────────────────

    pub fn available_methods(&self) -> Vec<String> {
        self.catalog.names()
    }

    pub fn current_method(&self) -> Result<String> {
        Ok(self.read()?.corpus.vectorizer().name().to_string())
    }

    /// Switch the vectorizer and re-vectorize the whole corpus before returning.
    /// Selecting the active method again is a no-op.
    pub fn set_vectorizer_method(&self, name: &str) -> Result<()> {
        if self.current_method()? == name {
            tracing::debug!(method = name, "vectorizer method unchanged");
            return Ok(());
        }
        let vectorizer = Arc::new(self.catalog.instantiate(name)?);

        let cached = match (&self.persistence, vectorizer.dimensions()) {
            (Some(p), Some(_)) => p.load_vectors(name).unwrap_or_else(|e| {
                tracing::warn!(method = name, error = %format!("{e:#}"), "vector cache unavailable");
                HashMap::new()
            }),
            _ => HashMap::new(),
        };

        let mut state = self.write()?;
        let fresh = state
            .corpus
            .revectorize(vectorizer, &cached)
            .map_err(EngineError::Vectorizer)?;
        tracing::info!(method = name, memories = state.corpus.len(), "vectorizer method switched");

        let _gate = self.handoff(state)?;
        self.persist("method", |p| {
            p.save_method(name)?;
            if !fresh.is_empty() {
                p.save_vectors(name, &fresh)?;
            }
            Ok(())
        })
    }

    // ── Locking & persistence ─────────────────────────────────────────────────

    fn read(&self) -> Result<RwLockReadGuard<'_, EngineState>> {
        self.state.read().map_err(|_| EngineError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, EngineState>> {
        self.state.write().map_err(|_| EngineError::LockPoisoned)
    }

    fn snapshot(&self) -> Result<CorpusSnapshot> {
        let state = self.read()?;
        Ok(state.corpus.snapshot(&state.scores))
    }

    /// Trade the state lock for the persistence gate without a gap in between.
    fn handoff(&self, state: RwLockWriteGuard<'_, EngineState>) -> Result<Option<MutexGuard<'_, ()>>> {
        if self.persistence.is_none() {
            return Ok(None);
        }
        let gate = self
            .persist_gate
            .lock()
            .map_err(|_| EngineError::LockPoisoned)?;
        drop(state);
        Ok(Some(gate))
    }

    fn persist<F>(&self, operation: &str, write: F) -> Result<()>
    where
        F: FnOnce(&dyn Persistence) -> anyhow::Result<()>,
    {
        let Some(persistence) = self.persistence.as_deref() else {
            return Ok(());
        };
        write(persistence).map_err(|e| {
            tracing::warn!(operation, error = %format!("{e:#}"), "persistence write failed");
            EngineError::Persistence(e)
        })
    }
}

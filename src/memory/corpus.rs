//! The indexed corpus: immutable records plus their cached vectors.
//!
//! Vectors are computed once per memory and reused until the content or the
//! vectorizer method changes. Read paths work on a [`CorpusSnapshot`], a cheap copy
//! of `Arc` handles taken under the engine's read lock.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use anyhow::Result;

use super::scores::ScoreStore;
use super::types::{Memory, MemoryRecord, ScoreState};
use super::vectorizer::{DocumentFrequencies, Projected, Vector, VectorSpace, Vectorizer};

/// Texts are vectorized in chunks of this size on bulk (re)vectorization.
const BATCH_SIZE: usize = 32;

#[derive(Debug, Clone)]
pub struct Entry {
    pub record: Arc<MemoryRecord>,
    pub vector: Arc<Vector>,
    pub word_count: usize,
}

#[derive(Debug)]
pub struct Corpus {
    vectorizer: Arc<Vectorizer>,
    /// Bumped on every method switch so in-flight vectors from the old space are detected.
    generation: u64,
    entries: BTreeMap<String, Entry>,
    frequencies: Arc<DocumentFrequencies>,
}

impl Corpus {
    pub fn new(vectorizer: Arc<Vectorizer>) -> Self {
        Self {
            vectorizer,
            generation: 0,
            entries: BTreeMap::new(),
            frequencies: Arc::new(DocumentFrequencies::default()),
        }
    }

    pub fn vectorizer(&self) -> &Arc<Vectorizer> {
        &self.vectorizer
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Entry> {
        self.entries.get(id)
    }

    /// Index a record whose vector was produced by the current vectorizer.
    pub fn insert(&mut self, record: MemoryRecord, vector: Vector) {
        if let Some(terms) = vector.terms() {
            Arc::make_mut(&mut self.frequencies).add(terms);
        }
        let word_count = record.content.split_whitespace().count();
        let id = record.id.clone();
        if let Some(previous) = self.entries.insert(
            id,
            Entry {
                record: Arc::new(record),
                vector: Arc::new(vector),
                word_count,
            },
        ) {
            self.forget_terms(&previous);
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<Entry> {
        let entry = self.entries.remove(id)?;
        self.forget_terms(&entry);
        Some(entry)
    }

    fn forget_terms(&mut self, entry: &Entry) {
        if let Some(terms) = entry.vector.terms() {
            Arc::make_mut(&mut self.frequencies).remove(terms);
        }
    }

    /// Re-vectorize every memory with `vectorizer` and swap it in.
    ///
    /// Nothing changes unless every memory vectorizes successfully. Dense vectors found
    /// in `cached` are reused; freshly computed dense vectors are returned so the
    /// caller can persist them.
    pub fn revectorize(
        &mut self,
        vectorizer: Arc<Vectorizer>,
        cached: &HashMap<String, Vec<f32>>,
    ) -> Result<Vec<(String, Vec<f32>)>> {
        let records: Vec<MemoryRecord> = self
            .entries
            .values()
            .map(|e| MemoryRecord::clone(&e.record))
            .collect();
        let (vectors, fresh) = vectorize_records(&vectorizer, &records, cached)?;

        let mut rebuilt = Corpus::new(vectorizer);
        rebuilt.generation = self.generation + 1;
        for (record, vector) in records.into_iter().zip(vectors) {
            rebuilt.insert(record, vector);
        }
        *self = rebuilt;
        Ok(fresh)
    }

    /// Copy the handles needed by read paths. Records without a score state fall back
    /// to a zero score.
    pub fn snapshot(&self, scores: &ScoreStore) -> CorpusSnapshot {
        let entries = self
            .entries
            .values()
            .map(|e| SnapshotEntry {
                record: Arc::clone(&e.record),
                vector: Arc::clone(&e.vector),
                word_count: e.word_count,
                state: scores.get(&e.record.id).unwrap_or(ScoreState {
                    score: 0.0,
                    last_reinforced: None,
                }),
            })
            .collect();
        CorpusSnapshot {
            vectorizer: Arc::clone(&self.vectorizer),
            entries,
            space: VectorSpace::new(Arc::clone(&self.frequencies)),
        }
    }
}

/// Vectorize records in batches, reusing cached dense vectors of matching dimension.
///
/// Returns vectors aligned with `records` plus the dense vectors that had to be computed.
pub fn vectorize_records(
    vectorizer: &Vectorizer,
    records: &[MemoryRecord],
    cached: &HashMap<String, Vec<f32>>,
) -> Result<(Vec<Vector>, Vec<(String, Vec<f32>)>)> {
    let expected_dims = vectorizer.dimensions();
    let mut vectors: Vec<Option<Vector>> = records
        .iter()
        .map(|r| match (expected_dims, cached.get(&r.id)) {
            (Some(dims), Some(v)) if v.len() == dims => Some(Vector::Dense(v.clone())),
            _ => None,
        })
        .collect();

    let missing: Vec<usize> = (0..records.len()).filter(|&i| vectors[i].is_none()).collect();
    let mut fresh = Vec::new();
    for chunk in missing.chunks(BATCH_SIZE) {
        let texts: Vec<&str> = chunk.iter().map(|&i| records[i].content.as_str()).collect();
        let computed = vectorizer.vectorize_batch(&texts)?;
        for (&i, vector) in chunk.iter().zip(computed) {
            if let Some(dense) = vector.dense() {
                fresh.push((records[i].id.clone(), dense.to_vec()));
            }
            vectors[i] = Some(vector);
        }
    }

    if !missing.is_empty() {
        tracing::debug!(
            method = vectorizer.name(),
            computed = missing.len(),
            reused = records.len() - missing.len(),
            "vectorized records"
        );
    }

    Ok((vectors.into_iter().flatten().collect(), fresh))
}

#[derive(Debug, Clone)]
pub struct SnapshotEntry {
    pub record: Arc<MemoryRecord>,
    pub vector: Arc<Vector>,
    pub word_count: usize,
    pub state: ScoreState,
}

/// Point-in-time view of the corpus, ordered by identifier.
#[derive(Debug, Clone)]
pub struct CorpusSnapshot {
    pub vectorizer: Arc<Vectorizer>,
    pub entries: Vec<SnapshotEntry>,
    pub space: VectorSpace,
}

impl CorpusSnapshot {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.record.id.clone()).collect()
    }

    pub fn memory(&self, index: usize) -> Memory {
        let entry = &self.entries[index];
        Memory::from_parts(&entry.record, entry.state)
    }

    /// Project every cached vector into this snapshot's space, in entry order.
    pub fn project_all(&self) -> Vec<Projected> {
        self.entries
            .iter()
            .map(|e| self.space.project(&e.vector))
            .collect()
    }
}

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{bail, Result};
use mnemos::config::ScoringConfig;
use mnemos::db::store::SqlitePersistence;
use mnemos::embedding::EmbeddingProvider;
use mnemos::memory::persist::{Persistence, ScoreOperation, StoredCorpus};
use mnemos::memory::scores::ScoreUpdate;
use mnemos::memory::types::Memory;
use mnemos::memory::vectorizer::{tokenize, MethodCatalog};
use mnemos::memory::MemoryEngine;

pub const SMART: &str = "I am very smart";
pub const GENIUS: &str = "I am a genius";
pub const PIZZA: &str = "I love pizza";

/// Name the keyword embedder is registered under.
pub const KEYWORDS: &str = "keywords";

/// Deterministic dense embedder: one dimension per vocabulary word, holding how
/// often that word occurs. Lets tests place memories at exact cosine distances.
pub struct KeywordEmbedder {
    vocabulary: Vec<&'static str>,
    calls: AtomicUsize,
}

impl KeywordEmbedder {
    pub fn new(vocabulary: &[&'static str]) -> Self {
        Self {
            vocabulary: vocabulary.to_vec(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Texts embedded so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EmbeddingProvider for KeywordEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let tokens = tokenize(text);
        Ok(self
            .vocabulary
            .iter()
            .map(|word| tokens.iter().filter(|t| t == word).count() as f32)
            .collect())
    }

    fn dimensions(&self) -> usize {
        self.vocabulary.len()
    }
}

pub const VOCABULARY: &[&str] = &["rust", "memory", "graph", "pizza", "alpha", "beta", "gamma", "delta"];

pub fn keyword_provider() -> Arc<KeywordEmbedder> {
    Arc::new(KeywordEmbedder::new(VOCABULARY))
}

/// `tfidf` plus the keyword embedder under [`KEYWORDS`].
pub fn catalog_with(provider: Arc<KeywordEmbedder>) -> MethodCatalog {
    MethodCatalog::tfidf_only().with_provider(KEYWORDS, provider)
}

pub fn tfidf_engine() -> MemoryEngine {
    MemoryEngine::in_memory(
        catalog_with(keyword_provider()),
        "tfidf",
        ScoringConfig::default(),
    )
    .unwrap()
}

pub fn keyword_engine() -> MemoryEngine {
    MemoryEngine::in_memory(
        catalog_with(keyword_provider()),
        KEYWORDS,
        ScoringConfig::default(),
    )
    .unwrap()
}

/// Engine backed by a SQLite file under `dir`.
pub fn sqlite_engine(dir: &Path, catalog: MethodCatalog, method: &str) -> MemoryEngine {
    let persistence = SqlitePersistence::open(dir.join("memory.db")).unwrap();
    MemoryEngine::open(catalog, method, ScoringConfig::default(), Box::new(persistence)).unwrap()
}

pub fn add_all(engine: &MemoryEngine, texts: &[&str]) -> Vec<Memory> {
    texts
        .iter()
        .map(|t| engine.add_memory(t, vec![], None).unwrap())
        .collect()
}

pub fn score_of(engine: &MemoryEngine, id: &str) -> f64 {
    engine.get_memory(id).unwrap().score
}

/// Current score of every memory, keyed by id.
pub fn scores(engine: &MemoryEngine) -> HashMap<String, f64> {
    engine
        .get_all_memories_flat()
        .unwrap()
        .into_iter()
        .map(|m| (m.id, m.score))
        .collect()
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

/// Persistence whose writes fail while the shared switch is on.
pub struct FailingPersistence {
    pub failing: Arc<AtomicBool>,
}

impl FailingPersistence {
    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("disk unavailable");
        }
        Ok(())
    }
}

impl Persistence for FailingPersistence {
    fn load(&self) -> Result<StoredCorpus> {
        Ok(StoredCorpus::default())
    }

    fn save_memory(&self, _memory: &Memory) -> Result<()> {
        self.check()
    }

    fn delete_memory(&self, _id: &str) -> Result<()> {
        self.check()
    }

    fn save_scores(&self, _operation: ScoreOperation, _updates: &[ScoreUpdate]) -> Result<()> {
        self.check()
    }

    fn save_method(&self, _method: &str) -> Result<()> {
        self.check()
    }

    fn load_vectors(&self, _method: &str) -> Result<HashMap<String, Vec<f32>>> {
        Ok(HashMap::new())
    }

    fn save_vectors(&self, _method: &str, _vectors: &[(String, Vec<f32>)]) -> Result<()> {
        self.check()
    }
}

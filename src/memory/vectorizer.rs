//! Text vectorization behind a swappable method.
//!
//! A [`Vectorizer`] turns text into a cached per-memory [`Vector`]. Two families
//! exist:
//!
//! - **TF-IDF** (`tfidf`): the cached vector holds raw term counts. IDF weights
//!   depend on the whole corpus, so they are applied when a snapshot is projected
//!   into a [`VectorSpace`], using [`DocumentFrequencies`] maintained
//!   incrementally on add and delete.
//! - **Embeddings** (`minilm` or any registered provider): the cached vector is the
//!   dense output of an [`EmbeddingProvider`].
//!
//! Vectors from different methods are never compared; switching methods
//! re-vectorizes the whole corpus.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use crate::config::EmbeddingConfig;
use crate::embedding::{self, EmbeddingProvider};
use crate::error::EngineError;

pub const TFIDF: &str = "tfidf";
pub const MINILM: &str = "minilm";

/// Tokens shorter than this are dropped (single letters carry no signal).
const MIN_TOKEN_CHARS: usize = 2;

/// Lowercase and split on anything that is not alphanumeric.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= MIN_TOKEN_CHARS)
        .map(str::to_lowercase)
        .collect()
}

/// Term frequencies of one text, in term order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TermCounts(BTreeMap<String, u32>);

impl TermCounts {
    pub fn from_text(text: &str) -> Self {
        let mut counts = BTreeMap::new();
        for token in tokenize(text) {
            *counts.entry(token).or_insert(0) += 1;
        }
        Self(counts)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.0.iter().map(|(t, &c)| (t.as_str(), c))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Number of documents containing each term.
#[derive(Debug, Clone, Default)]
pub struct DocumentFrequencies {
    documents: usize,
    counts: HashMap<String, usize>,
}

impl DocumentFrequencies {
    pub fn add(&mut self, terms: &TermCounts) {
        self.documents += 1;
        for (term, _) in terms.iter() {
            *self.counts.entry(term.to_string()).or_insert(0) += 1;
        }
    }

    pub fn remove(&mut self, terms: &TermCounts) {
        self.documents = self.documents.saturating_sub(1);
        for (term, _) in terms.iter() {
            if let Some(count) = self.counts.get_mut(term) {
                *count -= 1;
                if *count == 0 {
                    self.counts.remove(term);
                }
            }
        }
    }

    pub fn documents(&self) -> usize {
        self.documents
    }

    /// Smoothed IDF, `ln((1 + n) / (1 + df)) + 1`. `None` for terms outside the vocabulary.
    pub fn idf(&self, term: &str) -> Option<f64> {
        let df = *self.counts.get(term)?;
        let n = self.documents as f64;
        Some(((1.0 + n) / (1.0 + df as f64)).ln() + 1.0)
    }
}

/// Cached per-memory representation. Its variant always matches the method that made it.
#[derive(Debug, Clone, PartialEq)]
pub enum Vector {
    Terms(TermCounts),
    Dense(Vec<f32>),
}

impl Vector {
    pub fn terms(&self) -> Option<&TermCounts> {
        match self {
            Self::Terms(t) => Some(t),
            Self::Dense(_) => None,
        }
    }

    pub fn dense(&self) -> Option<&[f32]> {
        match self {
            Self::Dense(v) => Some(v.as_slice()),
            Self::Terms(_) => None,
        }
    }
}

/// The active vectorization strategy.
#[derive(Clone)]
pub enum Vectorizer {
    Tfidf,
    Embedding {
        name: String,
        provider: Arc<dyn EmbeddingProvider>,
    },
}

impl fmt::Debug for Vectorizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Vectorizer").field(&self.name()).finish()
    }
}

impl Vectorizer {
    pub fn name(&self) -> &str {
        match self {
            Self::Tfidf => TFIDF,
            Self::Embedding { name, .. } => name.as_str(),
        }
    }

    /// Dense output width, `None` for term-count vectors.
    pub fn dimensions(&self) -> Option<usize> {
        match self {
            Self::Tfidf => None,
            Self::Embedding { provider, .. } => Some(provider.dimensions()),
        }
    }

    pub fn vectorize(&self, text: &str) -> Result<Vector> {
        match self {
            Self::Tfidf => Ok(Vector::Terms(TermCounts::from_text(text))),
            Self::Embedding { provider, .. } => Ok(Vector::Dense(provider.embed(text)?)),
        }
    }

    pub fn vectorize_batch(&self, texts: &[&str]) -> Result<Vec<Vector>> {
        match self {
            Self::Tfidf => Ok(texts
                .iter()
                .map(|t| Vector::Terms(TermCounts::from_text(t)))
                .collect()),
            Self::Embedding { provider, .. } => {
                let dense = provider.embed_batch(texts)?;
                if dense.len() != texts.len() {
                    return Err(anyhow!(
                        "embedder returned {} vectors for {} texts",
                        dense.len(),
                        texts.len()
                    ));
                }
                Ok(dense.into_iter().map(Vector::Dense).collect())
            }
        }
    }
}

enum MethodSource {
    Tfidf,
    /// ONNX model loaded on first use and kept for later switches.
    LocalModel {
        config: EmbeddingConfig,
        loaded: Mutex<Option<Arc<dyn EmbeddingProvider>>>,
    },
    Provider(Arc<dyn EmbeddingProvider>),
}

/// Registry of vectorizer methods selectable by name.
pub struct MethodCatalog {
    entries: BTreeMap<String, MethodSource>,
}

impl MethodCatalog {
    /// Catalog with `tfidf` and the local `minilm` model.
    pub fn from_config(config: &EmbeddingConfig) -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(TFIDF.to_string(), MethodSource::Tfidf);
        entries.insert(
            MINILM.to_string(),
            MethodSource::LocalModel {
                config: config.clone(),
                loaded: Mutex::new(None),
            },
        );
        Self { entries }
    }

    /// Catalog with only `tfidf`.
    pub fn tfidf_only() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(TFIDF.to_string(), MethodSource::Tfidf);
        Self { entries }
    }

    /// Register (or replace) an embedding method backed by `provider`.
    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn EmbeddingProvider>) {
        self.entries.insert(name.into(), MethodSource::Provider(provider));
    }

    pub fn with_provider(mut self, name: impl Into<String>, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.register(name, provider);
        self
    }

    /// Method names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Build the vectorizer for `name`, loading its model if needed.
    pub fn instantiate(&self, name: &str) -> Result<Vectorizer, EngineError> {
        let source = self.entries.get(name).ok_or_else(|| EngineError::UnknownMethod {
            name: name.to_string(),
            available: self.names(),
        })?;

        match source {
            MethodSource::Tfidf => Ok(Vectorizer::Tfidf),
            MethodSource::Provider(provider) => Ok(Vectorizer::Embedding {
                name: name.to_string(),
                provider: Arc::clone(provider),
            }),
            MethodSource::LocalModel { config, loaded } => {
                let mut slot = loaded.lock().map_err(|_| EngineError::LockPoisoned)?;
                let provider = match slot.as_ref() {
                    Some(p) => Arc::clone(p),
                    None => {
                        let p: Arc<dyn EmbeddingProvider> = Arc::from(
                            embedding::create_provider(config).map_err(EngineError::Vectorizer)?,
                        );
                        *slot = Some(Arc::clone(&p));
                        p
                    }
                };
                Ok(Vectorizer::Embedding {
                    name: name.to_string(),
                    provider,
                })
            }
        }
    }
}

/// A vector projected into a snapshot's space: L2-normalized and directly comparable.
#[derive(Debug, Clone, PartialEq)]
pub enum Projected {
    /// `(term, weight)` pairs sorted by term.
    Sparse(Vec<(String, f64)>),
    Dense(Vec<f64>),
}

/// Projection context for one corpus snapshot.
#[derive(Debug, Clone)]
pub struct VectorSpace {
    frequencies: Arc<DocumentFrequencies>,
}

impl VectorSpace {
    pub fn new(frequencies: Arc<DocumentFrequencies>) -> Self {
        Self { frequencies }
    }

    pub fn project(&self, vector: &Vector) -> Projected {
        match vector {
            Vector::Terms(terms) => {
                // Terms outside the corpus vocabulary carry no weight.
                let weighted: Vec<(String, f64)> = terms
                    .iter()
                    .filter_map(|(term, tf)| {
                        self.frequencies
                            .idf(term)
                            .map(|idf| (term.to_string(), tf as f64 * idf))
                    })
                    .collect();
                let norm = weighted.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
                if norm > 0.0 {
                    Projected::Sparse(weighted.into_iter().map(|(t, w)| (t, w / norm)).collect())
                } else {
                    Projected::Sparse(Vec::new())
                }
            }
            Vector::Dense(values) => {
                let norm = values
                    .iter()
                    .map(|&x| (x as f64) * (x as f64))
                    .sum::<f64>()
                    .sqrt();
                if norm > 0.0 {
                    Projected::Dense(values.iter().map(|&x| x as f64 / norm).collect())
                } else {
                    Projected::Dense(vec![0.0; values.len()])
                }
            }
        }
    }
}

/// Cosine similarity of two projected vectors, clamped to `[0, 1]`.
///
/// Symmetric by construction: both forms sum products in a fixed index/term order.
/// Vectors of different kinds compare as `0.0`.
pub fn similarity(a: &Projected, b: &Projected) -> f64 {
    let dot = match (a, b) {
        (Projected::Dense(x), Projected::Dense(y)) => {
            x.iter().zip(y).map(|(p, q)| p * q).sum::<f64>()
        }
        (Projected::Sparse(x), Projected::Sparse(y)) => sparse_dot(x, y),
        _ => 0.0,
    };
    dot.clamp(0.0, 1.0)
}

/// Merge-join over two term-sorted lists.
fn sparse_dot(x: &[(String, f64)], y: &[(String, f64)]) -> f64 {
    let (mut i, mut j, mut dot) = (0, 0, 0.0);
    while i < x.len() && j < y.len() {
        match x[i].0.cmp(&y[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                dot += x[i].1 * y[j].1;
                i += 1;
                j += 1;
            }
        }
    }
    dot
}

#[cfg(test)]
mod tests {
    use super::*;

    fn space_for(texts: &[&str]) -> (VectorSpace, Vec<Projected>) {
        let mut df = DocumentFrequencies::default();
        let vectors: Vec<Vector> = texts
            .iter()
            .map(|t| Vector::Terms(TermCounts::from_text(t)))
            .collect();
        for v in &vectors {
            df.add(v.terms().unwrap());
        }
        let space = VectorSpace::new(Arc::new(df));
        let projected = vectors.iter().map(|v| space.project(v)).collect();
        (space, projected)
    }

    #[test]
    fn tokenize_drops_single_chars_and_punctuation() {
        assert_eq!(tokenize("Am I smart?"), vec!["am", "smart"]);
        assert_eq!(tokenize("I am a genius"), vec!["am", "genius"]);
        assert!(tokenize("  ").is_empty());
    }

    #[test]
    fn document_frequencies_track_add_and_remove() {
        let mut df = DocumentFrequencies::default();
        let a = TermCounts::from_text("rust rust memory");
        let b = TermCounts::from_text("memory graph");
        df.add(&a);
        df.add(&b);
        assert_eq!(df.documents(), 2);
        assert!(df.idf("memory").unwrap() < df.idf("rust").unwrap());

        df.remove(&a);
        assert_eq!(df.documents(), 1);
        assert_eq!(df.idf("rust"), None);
        assert_eq!(df.idf("memory"), Some(1.0));
    }

    #[test]
    fn tfidf_similarity_is_symmetric_and_bounded() {
        let (_, p) = space_for(&["I am very smart", "I am a genius", "I love pizza"]);
        for a in &p {
            for b in &p {
                let s = similarity(a, b);
                assert!((0.0..=1.0).contains(&s));
                assert_eq!(s, similarity(b, a));
            }
        }
        assert_eq!(similarity(&p[0], &p[2]), 0.0);
        assert!(similarity(&p[0], &p[1]) > 0.0);
    }

    #[test]
    fn query_terms_outside_vocabulary_are_ignored() {
        let (space, p) = space_for(&["rust memory engine", "pizza night"]);
        let query = space.project(&Vector::Terms(TermCounts::from_text("quantum rust")));
        let only_known = space.project(&Vector::Terms(TermCounts::from_text("rust")));
        assert_eq!(query, only_known);
        assert!(similarity(&query, &p[0]) > 0.0);

        let unknown = space.project(&Vector::Terms(TermCounts::from_text("quantum")));
        assert_eq!(similarity(&unknown, &p[0]), 0.0);
    }

    #[test]
    fn dense_similarity_clamps_negative_cosine() {
        let space = VectorSpace::new(Arc::new(DocumentFrequencies::default()));
        let a = space.project(&Vector::Dense(vec![1.0, 0.0]));
        let b = space.project(&Vector::Dense(vec![-1.0, 0.0]));
        let c = space.project(&Vector::Dense(vec![2.0, 0.0]));
        assert_eq!(similarity(&a, &b), 0.0);
        assert!((similarity(&a, &c) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn mixed_kinds_never_compare() {
        let a = Projected::Dense(vec![1.0]);
        let b = Projected::Sparse(vec![("x".into(), 1.0)]);
        assert_eq!(similarity(&a, &b), 0.0);
    }

    #[test]
    fn catalog_rejects_unknown_method() {
        let catalog = MethodCatalog::tfidf_only();
        let err = catalog.instantiate("word2vec").unwrap_err();
        match err {
            EngineError::UnknownMethod { name, available } => {
                assert_eq!(name, "word2vec");
                assert_eq!(available, vec!["tfidf".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(catalog.instantiate("tfidf").unwrap().name(), "tfidf");
    }

    #[test]
    fn catalog_lists_builtin_methods() {
        let catalog = MethodCatalog::from_config(&EmbeddingConfig::default());
        assert_eq!(catalog.names(), vec!["minilm".to_string(), "tfidf".to_string()]);
    }
}

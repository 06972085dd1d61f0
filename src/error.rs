//! Error type shared by the engine and its collaborators.

use thiserror::Error;

/// Result alias using [`EngineError`].
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors surfaced by [`MemoryEngine`](crate::memory::engine::MemoryEngine) operations.
///
/// Operations over an empty or single-memory corpus never fail; they return empty
/// matrices, graphs and result lists instead.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No memory with the given identifier exists.
    #[error("memory not found: {0}")]
    NotFound(String),

    /// A threshold, weight or other setting is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Caller-supplied input was rejected (empty content, negative strength).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The requested vectorizer method is not registered.
    #[error("unknown vectorizer method `{name}` (available: {})", .available.join(", "))]
    UnknownMethod { name: String, available: Vec<String> },

    /// The vectorizer failed to turn text into a vector.
    #[error("vectorizer error: {0:#}")]
    Vectorizer(anyhow::Error),

    /// The persistence collaborator failed. In-memory state is already updated.
    #[error("persistence error: {0:#}")]
    Persistence(anyhow::Error),

    /// A thread panicked while holding the engine state lock.
    #[error("engine state lock poisoned")]
    LockPoisoned,
}

impl EngineError {
    /// `true` for errors that leave the in-memory state updated (best-effort durability).
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Persistence(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_method_lists_available() {
        let err = EngineError::UnknownMethod {
            name: "word2vec".into(),
            available: vec!["minilm".into(), "tfidf".into()],
        };
        assert_eq!(
            err.to_string(),
            "unknown vectorizer method `word2vec` (available: minilm, tfidf)"
        );
    }

    #[test]
    fn persistence_errors_are_flagged() {
        let err = EngineError::Persistence(anyhow::anyhow!("disk full"));
        assert!(err.is_persistence());
        assert!(err.to_string().contains("disk full"));
        assert!(!EngineError::NotFound("x".into()).is_persistence());
    }
}

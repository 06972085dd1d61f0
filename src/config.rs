use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::EngineError;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct MnemosConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub vectorizer: VectorizerConfig,
    pub embedding: EmbeddingConfig,
    pub scoring: ScoringConfig,
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub transport: String,
    pub log_level: String,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct VectorizerConfig {
    /// Method used for a fresh corpus. A stored method takes precedence.
    pub method: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: String,
    pub cache_dir: String,
}

/// How much a recalled memory is reinforced by a search.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecallStrength {
    /// Relevance of the hit, clamped to `[0, 1]`.
    Relevance,
    /// Always `unit_strength`.
    Unit,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ScoringConfig {
    /// Similarity at or above which two memories are connected.
    pub connection_threshold: f64,
    /// Score assigned to a freshly added memory.
    pub initial_score: f64,
    /// Strength of an explicit reinforcement when the caller gives none.
    pub unit_strength: f64,
    /// Fraction of a reinforcement passed on to each first-degree neighbour.
    pub neighbor_share: f64,
    pub relevance_weight: f64,
    pub score_weight: f64,
    /// Stored scores are divided by this before blending with relevance.
    pub score_scale: f64,
    pub recall_strength: RecallStrength,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub default_top_k: usize,
    pub min_relevance: f64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: "stdio".into(),
            log_level: "info".into(),
            host: "127.0.0.1".into(),
            port: 8765,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_mnemos_dir()
            .join("memory.db")
            .to_string_lossy()
            .into_owned();
        Self { db_path }
    }
}

impl Default for VectorizerConfig {
    fn default() -> Self {
        Self {
            method: crate::memory::vectorizer::TFIDF.into(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        let cache_dir = default_mnemos_dir()
            .join("models")
            .to_string_lossy()
            .into_owned();
        Self {
            provider: "local".into(),
            model: "all-MiniLM-L6-v2".into(),
            cache_dir,
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            connection_threshold: 0.35,
            initial_score: 1.0,
            unit_strength: 1.0,
            neighbor_share: 0.3,
            relevance_weight: 0.7,
            score_weight: 0.3,
            score_scale: 100.0,
            recall_strength: RecallStrength::Relevance,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_top_k: 10,
            min_relevance: 0.2,
        }
    }
}

impl ScoringConfig {
    /// Reject settings that would break ranking monotonicity or the graph contract.
    pub fn validate(&self) -> std::result::Result<(), EngineError> {
        let unit_interval = [
            ("connection_threshold", self.connection_threshold),
            ("neighbor_share", self.neighbor_share),
        ];
        for (name, value) in unit_interval {
            if !(0.0..=1.0).contains(&value) {
                return Err(EngineError::InvalidConfiguration(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }

        let non_negative = [
            ("initial_score", self.initial_score),
            ("unit_strength", self.unit_strength),
            ("relevance_weight", self.relevance_weight),
            ("score_weight", self.score_weight),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(EngineError::InvalidConfiguration(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }

        if !self.score_scale.is_finite() || self.score_scale <= 0.0 {
            return Err(EngineError::InvalidConfiguration(format!(
                "score_scale must be positive, got {}",
                self.score_scale
            )));
        }
        Ok(())
    }
}

/// Returns `~/.mnemos/`
pub fn default_mnemos_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".mnemos")
}

/// Returns the default config file path: `~/.mnemos/config.toml`
pub fn default_config_path() -> PathBuf {
    default_mnemos_dir().join("config.toml")
}

impl MnemosConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            MnemosConfig::default()
        };

        config.apply_env_overrides();
        config.scoring.validate().context("invalid [scoring] section")?;
        Ok(config)
    }

    /// Apply environment variable overrides (MNEMOS_DB, MNEMOS_METHOD, MNEMOS_LOG_LEVEL).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("MNEMOS_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("MNEMOS_METHOD") {
            self.vectorizer.method = val;
        }
        if let Ok(val) = std::env::var("MNEMOS_LOG_LEVEL") {
            self.server.log_level = val;
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

//! Memory scoring and connection engine: a similarity graph over short text
//! memories whose scores grow with use.
//!
//! mnemos stores short text "memories", ranks them against natural language
//! queries and keeps a thresholded similarity graph between them. Every search
//! reinforces the memories it returns, and a share of that reinforcement flows to
//! their first-degree neighbours, so frequently recalled knowledge rises over time.
//!
//! # Architecture
//!
//! - **Vectorizers**: TF-IDF (default) or local ONNX all-MiniLM-L6-v2 embeddings,
//!   switchable at runtime with a full re-vectorization
//! - **Graph**: cosine similarity matrix thresholded into an adjacency list
//! - **Scores**: reinforced on recall, reset only by an explicit recalculation
//! - **Storage**: SQLite, written after the in-memory state changes
//! - **Transport**: MCP over stdio (primary) or Streamable HTTP
//!
//! # Modules
//!
//! - [`config`]: configuration loading from TOML files and environment variables
//! - [`db`]: SQLite schema, migrations and the persistence implementation
//! - [`embedding`]: text-to-vector embedding via ONNX Runtime
//! - [`error`]: the engine error type
//! - [`memory`]: the engine: vectorizer, similarity, graph, search and scores

pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod memory;

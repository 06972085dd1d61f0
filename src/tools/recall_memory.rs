//! MCP `recall_memory` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `recall_memory` MCP tool.
///
/// An empty `query` lists every memory by score without reinforcing anything.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RecallMemoryParams {
    /// Natural language query.
    #[schemars(
        description = "Natural language query. An empty query lists all memories by score and reinforces nothing."
    )]
    pub query: String,

    /// Maximum number of results. Defaults to `retrieval.default_top_k`.
    #[schemars(description = "Maximum number of results to return. Defaults to 10.")]
    pub top_k: Option<usize>,

    /// Relevance floor in `[0, 1]`. Defaults to `retrieval.min_relevance`.
    #[schemars(description = "Minimum relevance (0.0-1.0) for a memory to be returned. Defaults to 0.2.")]
    pub min_relevance: Option<f64>,

    /// Only memories carrying every listed tag are considered.
    #[schemars(description = "Only return memories carrying all of these tags")]
    pub tags: Option<Vec<String>>,
}

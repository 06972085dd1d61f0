//! MCP `memory_network` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct MemoryNetworkParams {
    /// Connection threshold in `[0, 1]`. Defaults to `scoring.connection_threshold`.
    #[schemars(description = "Similarity threshold (0.0-1.0) for drawing a connection. Defaults to 0.35.")]
    pub threshold: Option<f64>,

    /// `false` recalculates every score from the graph before returning the view.
    #[schemars(
        description = "Keep accumulated reinforcement (default: true). false resets every score from the graph and requires confirm=true."
    )]
    pub preserve_reinforcement: Option<bool>,

    #[schemars(description = "Must be true when preserve_reinforcement is false")]
    pub confirm: Option<bool>,
}

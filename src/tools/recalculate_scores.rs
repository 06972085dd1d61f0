use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RecalculateScoresParams {
    #[schemars(description = "Similarity threshold (0.0-1.0) for the graph scores are derived from. Defaults to 0.35.")]
    pub threshold: Option<f64>,

    #[schemars(
        description = "Must be true. Recalculation discards all accumulated reinforcement and cannot be undone."
    )]
    pub confirm: bool,
}

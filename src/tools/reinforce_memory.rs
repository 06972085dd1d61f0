use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ReinforceMemoryParams {
    #[schemars(description = "ID of the memory to reinforce")]
    pub memory_id: String,

    #[schemars(
        description = "Amount added to the score (>= 0). Connected memories receive a share of it (30% by default). Defaults to 1.0."
    )]
    pub strength: Option<f64>,
}

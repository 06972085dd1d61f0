use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ListMemoriesParams {
    #[schemars(
        description = "Return only the N highest-scoring memories. Omit to list every memory in creation order."
    )]
    pub limit: Option<usize>,

    #[schemars(
        description = "If set, pack the top memories into at most this many characters of JSON for LLM context"
    )]
    pub char_budget: Option<usize>,
}

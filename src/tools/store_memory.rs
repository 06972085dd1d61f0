use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct StoreMemoryParams {
    #[schemars(description = "The natural language content of the memory")]
    pub content: String,

    #[schemars(description = "Optional tags. Duplicates are dropped; order is kept for display only.")]
    pub tags: Option<Vec<String>>,

    #[schemars(
        description = "Vectorizer method the caller expects (e.g. 'tfidf'). Must match the active method if given."
    )]
    pub method: Option<String>,
}

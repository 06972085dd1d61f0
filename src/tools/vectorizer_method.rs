use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct VectorizerMethodParams {
    #[schemars(
        description = "Method to switch to (re-vectorizes every memory). Omit to report the current and available methods."
    )]
    pub method: Option<String>,
}

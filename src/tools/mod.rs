pub mod forget_memory;
pub mod list_memories;
pub mod memory_network;
pub mod recalculate_scores;
pub mod recall_memory;
pub mod reinforce_memory;
pub mod store_memory;
pub mod vectorizer_method;

use forget_memory::ForgetMemoryParams;
use list_memories::ListMemoriesParams;
use memory_network::MemoryNetworkParams;
use recalculate_scores::RecalculateScoresParams;
use recall_memory::RecallMemoryParams;
use reinforce_memory::ReinforceMemoryParams;
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{tool, tool_handler, tool_router, ServerHandler};
use std::sync::Arc;
use store_memory::StoreMemoryParams;
use vectorizer_method::VectorizerMethodParams;

use crate::config::MnemosConfig;
use crate::memory::search::SearchRequest;
use crate::memory::MemoryEngine;

/// The mnemos MCP tool handler. Holds the shared engine and config and exposes
/// every engine operation via the `#[tool_router]` macro.
#[derive(Clone)]
pub struct MnemosTools {
    tool_router: ToolRouter<Self>,
    engine: Arc<MemoryEngine>,
    config: Arc<MnemosConfig>,
}

impl MnemosTools {
    /// Run an engine call on the blocking pool (vectorizing and SQLite are synchronous).
    async fn blocking<T, F>(&self, task: &str, f: F) -> Result<T, String>
    where
        F: FnOnce(&MemoryEngine) -> crate::error::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let engine = Arc::clone(&self.engine);
        tokio::task::spawn_blocking(move || f(&engine))
            .await
            .map_err(|e| format!("{task} task failed: {e}"))?
            .map_err(|e| format!("{task} failed: {e}"))
    }

    fn threshold_or_default(&self, threshold: Option<f64>) -> f64 {
        threshold.unwrap_or(self.config.scoring.connection_threshold)
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string(value).map_err(|e| format!("serialization failed: {e}"))
}

#[tool_router]
impl MnemosTools {
    pub fn new(engine: Arc<MemoryEngine>, config: Arc<MnemosConfig>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            engine,
            config,
        }
    }

    /// Store a new memory.
    #[tool(description = "Store a new memory with optional tags. It starts with the initial score and is connected to similar memories automatically.")]
    async fn store_memory(
        &self,
        Parameters(params): Parameters<StoreMemoryParams>,
    ) -> Result<String, String> {
        if params.content.trim().is_empty() {
            return Err("content must not be empty".into());
        }
        tracing::info!(content_len = params.content.len(), "store_memory called");

        let tags = params.tags.unwrap_or_default();
        let memory = self
            .blocking("store", move |engine| {
                engine.add_memory(&params.content, tags, params.method.as_deref())
            })
            .await?;
        to_json(&memory)
    }

    /// Search memories; results are reinforced.
    #[tool(description = "Search memories by natural language query. Returned memories and their close neighbours are reinforced, so frequently recalled memories rise over time.")]
    async fn recall_memory(
        &self,
        Parameters(params): Parameters<RecallMemoryParams>,
    ) -> Result<String, String> {
        let request = SearchRequest::new(
            params.query,
            params.top_k.unwrap_or(self.config.retrieval.default_top_k),
            params
                .min_relevance
                .unwrap_or(self.config.retrieval.min_relevance),
        )
        .with_tags(params.tags.unwrap_or_default());
        tracing::info!(query_len = request.query.len(), top_k = request.top_k, "recall_memory called");

        let response = self
            .blocking("search", move |engine| engine.search(&request))
            .await?;
        if let Some(ref err) = response.persistence_error {
            tracing::warn!(error = %err, "search reinforcement not persisted");
        }
        to_json(&response)
    }

    /// Delete a memory.
    #[tool(description = "Permanently delete a memory by ID. It disappears from search, the network and all scores.")]
    async fn forget_memory(
        &self,
        Parameters(params): Parameters<ForgetMemoryParams>,
    ) -> Result<String, String> {
        tracing::info!(id = %params.memory_id, "forget_memory called");
        let id = params.memory_id;
        let memory = self
            .blocking("delete", move |engine| engine.delete_memory(&id))
            .await?;
        Ok(serde_json::json!({ "deleted": memory.id }).to_string())
    }

    /// List memories without side effects.
    #[tool(description = "List memories with their current scores. Never changes a score. Use limit for the top N, or char_budget to pack the top memories for LLM context.")]
    async fn list_memories(
        &self,
        Parameters(params): Parameters<ListMemoriesParams>,
    ) -> Result<String, String> {
        if let Some(budget) = params.char_budget {
            let export = self
                .blocking("export", move |engine| engine.export_for_llm(budget))
                .await?;
            return to_json(&export);
        }

        let memories = match params.limit {
            Some(limit) => {
                self.blocking("list", move |engine| engine.top_memories(limit))
                    .await?
            }
            None => {
                self.blocking("list", |engine| engine.get_all_memories_flat())
                    .await?
            }
        };
        Ok(serde_json::json!({ "total": memories.len(), "memories": memories }).to_string())
    }

    /// Similarity matrix and connection graph.
    #[tool(description = "Return the memory network: nodes with scores, the connection graph at a threshold, and the similarity matrix. Scores are preserved unless preserve_reinforcement=false and confirm=true, which recalculates every score and returns the report with the network it was derived from.")]
    async fn memory_network(
        &self,
        Parameters(params): Parameters<MemoryNetworkParams>,
    ) -> Result<String, String> {
        let threshold = self.threshold_or_default(params.threshold);
        let preserve = params.preserve_reinforcement.unwrap_or(true);
        tracing::info!(threshold, preserve, "memory_network called");

        if !preserve {
            if params.confirm != Some(true) {
                return Err(
                    "preserve_reinforcement=false discards all reinforcement; pass confirm=true".into(),
                );
            }
            let recalculated = self
                .blocking("recalculate", move |engine| {
                    engine.recalculate_scores_and_connections(threshold)
                })
                .await?;
            return to_json(&recalculated);
        }

        let view = self
            .blocking("network", move |engine| {
                engine.compute_scores_and_connections(threshold)
            })
            .await?;
        to_json(&view)
    }

    /// Reset every score from the graph.
    #[tool(description = "Recalculate every score from the connection graph, discarding all accumulated reinforcement. Requires confirm=true.")]
    async fn recalculate_scores(
        &self,
        Parameters(params): Parameters<RecalculateScoresParams>,
    ) -> Result<String, String> {
        if !params.confirm {
            return Err("recalculation discards all reinforcement; pass confirm=true".into());
        }
        let threshold = self.threshold_or_default(params.threshold);
        tracing::info!(threshold, "recalculate_scores called");

        let report = self
            .blocking("recalculate", move |engine| {
                engine.recalculate_all_scores(threshold)
            })
            .await?;
        to_json(&report)
    }

    /// Reinforce one memory by hand.
    #[tool(description = "Reinforce a memory by ID. Its score grows by strength and connected memories receive a share.")]
    async fn reinforce_memory(
        &self,
        Parameters(params): Parameters<ReinforceMemoryParams>,
    ) -> Result<String, String> {
        tracing::info!(id = %params.memory_id, strength = ?params.strength, "reinforce_memory called");
        let id = params.memory_id;
        let strength = params.strength;
        let result = self
            .blocking("reinforce", move |engine| engine.reinforce(&id, strength))
            .await?;
        to_json(&result)
    }

    /// Report or switch the vectorizer method.
    #[tool(description = "Report the current and available vectorizer methods, or switch methods. Switching re-vectorizes every memory.")]
    async fn vectorizer_method(
        &self,
        Parameters(params): Parameters<VectorizerMethodParams>,
    ) -> Result<String, String> {
        let (current, available) = self
            .blocking("method", move |engine| {
                if let Some(method) = params.method {
                    tracing::info!(method = %method, "vectorizer_method switch requested");
                    engine.set_vectorizer_method(&method)?;
                }
                Ok((engine.current_method()?, engine.available_methods()))
            })
            .await?;
        Ok(serde_json::json!({ "current": current, "available": available }).to_string())
    }
}

#[tool_handler]
impl ServerHandler for MnemosTools {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo {
            instructions: Some(
                "mnemos is a memory server whose scores grow with use. Use store_memory to save, \
                 recall_memory to search (results are reinforced), and memory_network to see how \
                 memories connect."
                    .into(),
            ),
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}

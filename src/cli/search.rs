use anyhow::Result;

use crate::config::MnemosConfig;
use crate::memory::search::{truncate_preview, SearchRequest};

/// Run a search from the terminal. Results are reinforced like any other search.
pub fn search(
    config: &MnemosConfig,
    query: &str,
    top_k: Option<usize>,
    min_relevance: Option<f64>,
    tags: Vec<String>,
) -> Result<()> {
    let engine = super::open_engine(config)?;

    let request = SearchRequest::new(
        query,
        top_k.unwrap_or(config.retrieval.default_top_k),
        min_relevance.unwrap_or(config.retrieval.min_relevance),
    )
    .with_tags(tags);
    let response = engine.search(&request)?;

    if response.results.is_empty() {
        println!("No results found.");
        return Ok(());
    }

    println!(
        "Found {} result(s), showing {}\n",
        response.total_matched,
        response.results.len()
    );

    for (i, hit) in response.results.iter().enumerate() {
        println!(
            "  {}. {} (relevance: {:.3}, score: {:.3}, final: {:.4})",
            i + 1,
            hit.memory.id,
            hit.relevance_score,
            hit.memory.score,
            hit.final_score,
        );
        println!("     {}", truncate_preview(&hit.memory.content, 120));
        if !hit.memory.tags.is_empty() {
            println!("     tags: {}", hit.memory.tags.join(", "));
        }
        println!();
    }

    if response.reinforced > 0 {
        println!("Reinforced {} memories.", response.reinforced);
    }
    if let Some(err) = response.persistence_error {
        eprintln!("warning: reinforcement was not saved: {err}");
    }

    Ok(())
}

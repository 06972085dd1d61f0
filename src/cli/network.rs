//! CLI `network` and `recalculate` commands.

use anyhow::{bail, Result};

use crate::config::MnemosConfig;
use crate::memory::search::truncate_preview;

/// Print the connection graph. Never changes a score.
pub fn network(config: &MnemosConfig, threshold: Option<f64>, json: bool) -> Result<()> {
    let engine = super::open_engine(config)?;
    let threshold = threshold.unwrap_or(config.scoring.connection_threshold);
    let view = engine.compute_scores_and_connections(threshold)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    println!(
        "Memory network: {} memories, {} connections at threshold {:.2}",
        view.nodes.len(),
        view.graph.edge_count(),
        threshold
    );
    println!("{}", "=".repeat(40));
    for (i, node) in view.nodes.iter().enumerate() {
        println!(
            "  [{:.3}] {} {}",
            node.score,
            node.id,
            truncate_preview(&node.content, 60)
        );
        for neighbor in view.graph.neighbors(i) {
            println!(
                "      -> {:.3}  {}",
                neighbor.weight,
                truncate_preview(&view.nodes[neighbor.index].content, 60)
            );
        }
    }
    Ok(())
}

/// Reset every score from the graph after confirmation.
pub fn recalculate(config: &MnemosConfig, threshold: Option<f64>, yes: bool) -> Result<()> {
    let threshold = threshold.unwrap_or(config.scoring.connection_threshold);
    let prompt = format!(
        "WARNING: This replaces every score with one derived from the graph at threshold {threshold:.2}.\n\
         All accumulated reinforcement is discarded.\n\
         Database: {}",
        config.resolved_db_path().display()
    );
    if !super::confirm(&prompt, yes)? {
        bail!("recalculation cancelled");
    }

    let engine = super::open_engine(config)?;
    let report = engine.recalculate_all_scores(threshold)?;
    println!(
        "Recalculated {} scores from {} connections.",
        report.scores.len(),
        report.edges
    );
    Ok(())
}

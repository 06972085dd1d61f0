//! CLI commands that add, list, reinforce and delete single memories.

use anyhow::{bail, Result};

use crate::config::MnemosConfig;
use crate::memory::search::truncate_preview;
use crate::memory::types::Memory;

pub fn add(config: &MnemosConfig, content: &str, tags: Vec<String>) -> Result<()> {
    let engine = super::open_engine(config)?;
    let memory = engine.add_memory(content, tags, None)?;
    println!("Stored {} (score: {:.3})", memory.id, memory.score);
    Ok(())
}

/// List memories by score. `limit` keeps the top N; `json` prints the raw records.
pub fn list(config: &MnemosConfig, limit: Option<usize>, json: bool) -> Result<()> {
    let engine = super::open_engine(config)?;
    let total = engine.len()?;
    let memories = engine.top_memories(limit.unwrap_or(total))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&memories)?);
        return Ok(());
    }
    if memories.is_empty() {
        println!("No memories stored.");
        return Ok(());
    }

    println!("{} of {} memories by score", memories.len(), total);
    println!("{}", "=".repeat(40));
    for memory in &memories {
        print_memory(memory);
    }
    Ok(())
}

/// Pack the top memories into `budget` characters of JSON.
pub fn export(config: &MnemosConfig, budget: usize) -> Result<()> {
    let engine = super::open_engine(config)?;
    let export = engine.export_for_llm(budget)?;
    println!("{}", serde_json::to_string_pretty(&export)?);
    Ok(())
}

pub fn reinforce(config: &MnemosConfig, id: &str, strength: Option<f64>) -> Result<()> {
    let engine = super::open_engine(config)?;
    let result = engine.reinforce(id, strength)?;
    println!(
        "Reinforced {} (score: {:.3}, neighbours reinforced: {})",
        result.memory.id, result.memory.score, result.neighbors_reinforced
    );
    Ok(())
}

pub fn forget(config: &MnemosConfig, id: &str, yes: bool) -> Result<()> {
    let engine = super::open_engine(config)?;
    let memory = engine.get_memory(id)?;
    let prompt = format!(
        "Delete memory {}?\n  {}",
        memory.id,
        truncate_preview(&memory.content, 120)
    );
    if !super::confirm(&prompt, yes)? {
        bail!("delete cancelled");
    }
    engine.delete_memory(id)?;
    println!("Deleted {id}");
    Ok(())
}

fn print_memory(memory: &Memory) {
    let reinforced = memory
        .last_reinforced
        .map_or_else(|| "never".to_string(), |t| t.to_rfc3339());
    println!(
        "  {:>8.3}  {}  (reinforced: {})",
        memory.score, memory.id, reinforced
    );
    println!("            {}", truncate_preview(&memory.content, 100));
}

use anyhow::Result;

use crate::config::MnemosConfig;

/// Show the vectorizer methods, or switch to `name` and re-vectorize everything.
pub fn method(config: &MnemosConfig, name: Option<&str>) -> Result<()> {
    let engine = super::open_engine(config)?;

    if let Some(name) = name {
        let count = engine.len()?;
        println!("Switching to `{name}` and re-vectorizing {count} memories...");
        engine.set_vectorizer_method(name)?;
    }

    let current = engine.current_method()?;
    println!("Vectorizer methods:");
    for available in engine.available_methods() {
        let marker = if available == current { "*" } else { " " };
        println!("  {marker} {available}");
    }
    Ok(())
}

mod cli;
mod config;
mod db;
mod embedding;
mod error;
mod memory;
mod server;
mod tools;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mnemos", version, about = "Memory engine whose scores grow with use, served over MCP")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the MCP server (stdio transport unless --http)
    Serve {
        /// Serve Streamable HTTP on server.host:server.port instead of stdio
        #[arg(long)]
        http: bool,
    },
    /// Store a new memory
    Add {
        content: String,
        /// Tag to attach (repeatable)
        #[arg(long = "tag", short)]
        tags: Vec<String>,
    },
    /// Search memories (results are reinforced)
    Search {
        query: String,
        #[arg(long, short = 'k')]
        top_k: Option<usize>,
        #[arg(long)]
        min_relevance: Option<f64>,
        /// Only memories carrying this tag (repeatable)
        #[arg(long = "tag", short)]
        tags: Vec<String>,
    },
    /// List memories by score
    List {
        #[arg(long, short = 'n')]
        limit: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// Export the top memories as JSON within a character budget
    Export {
        #[arg(long, default_value_t = 2000)]
        budget: usize,
    },
    /// Show the connection graph
    Network {
        #[arg(long)]
        threshold: Option<f64>,
        #[arg(long)]
        json: bool,
    },
    /// Reinforce a memory by ID
    Reinforce {
        id: String,
        #[arg(long)]
        strength: Option<f64>,
    },
    /// Reset every score from the connection graph
    Recalculate {
        #[arg(long)]
        threshold: Option<f64>,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Delete a memory by ID
    Forget {
        id: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Show vectorizer methods, or switch to NAME
    Method { name: Option<String> },
    /// Manage the embedding model
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
}

#[derive(Subcommand)]
enum ModelAction {
    /// Download the embedding model to ~/.mnemos/models/
    Download,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config (for log level)
    let config = config::MnemosConfig::load()?;

    // Log to stderr so stdout stays clean for MCP JSON-RPC.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve { http } => {
            if http || config.server.transport == "http" {
                server::serve_http(config).await?;
            } else {
                server::serve_stdio(config).await?;
            }
        }
        Command::Add { content, tags } => cli::memories::add(&config, &content, tags)?,
        Command::Search {
            query,
            top_k,
            min_relevance,
            tags,
        } => cli::search::search(&config, &query, top_k, min_relevance, tags)?,
        Command::List { limit, json } => cli::memories::list(&config, limit, json)?,
        Command::Export { budget } => cli::memories::export(&config, budget)?,
        Command::Network { threshold, json } => cli::network::network(&config, threshold, json)?,
        Command::Reinforce { id, strength } => cli::memories::reinforce(&config, &id, strength)?,
        Command::Recalculate { threshold, yes } => {
            cli::network::recalculate(&config, threshold, yes)?
        }
        Command::Forget { id, yes } => cli::memories::forget(&config, &id, yes)?,
        Command::Method { name } => cli::method::method(&config, name.as_deref())?,
        Command::Model { action } => match action {
            ModelAction::Download => {
                cli::model_download(&config.embedding).await?;
            }
        },
    }

    Ok(())
}

//! MCP server initialization for stdio and Streamable HTTP transports.
//!
//! Both entry points build one [`MemoryEngine`] for the whole process and share it
//! with every tool handler.

use crate::config::MnemosConfig;
use crate::memory::MemoryEngine;
use crate::tools::MnemosTools;
use anyhow::Result;
use rmcp::ServiceExt;
use std::sync::Arc;

/// Shared setup: open the database and restore the engine from it.
/// Loading may vectorize the corpus, so it runs on the blocking pool.
async fn setup_shared_state(config: MnemosConfig) -> Result<(Arc<MemoryEngine>, Arc<MnemosConfig>)> {
    let config = Arc::new(config);
    let setup_config = Arc::clone(&config);
    let engine = tokio::task::spawn_blocking(move || crate::cli::open_engine(&setup_config)).await??;
    tracing::info!(
        db = %config.resolved_db_path().display(),
        method = %engine.current_method()?,
        "memory engine ready"
    );
    Ok((Arc::new(engine), config))
}

/// Start the MCP server over stdio transport.
pub async fn serve_stdio(config: MnemosConfig) -> Result<()> {
    tracing::info!("starting mnemos MCP server on stdio");

    let (engine, config) = setup_shared_state(config).await?;

    let tools = MnemosTools::new(engine, config);
    let transport = rmcp::transport::stdio();

    let server = tools.serve(transport).await?;
    tracing::info!("MCP server running, waiting for client");

    server.waiting().await?;
    tracing::info!("MCP server shut down");

    Ok(())
}

/// Start the MCP server over Streamable HTTP transport.
pub async fn serve_http(config: MnemosConfig) -> Result<()> {
    let host = config.server.host.clone();
    let port = config.server.port;
    let bind_addr = format!("{host}:{port}");

    tracing::info!(addr = %bind_addr, "starting mnemos MCP server on HTTP");

    let (engine, config) = setup_shared_state(config).await?;

    let service = rmcp::transport::streamable_http_server::StreamableHttpService::new(
        move || Ok(MnemosTools::new(engine.clone(), config.clone())),
        rmcp::transport::streamable_http_server::session::local::LocalSessionManager::default()
            .into(),
        Default::default(),
    );

    let router = axum::Router::new().nest_service("/mcp", service);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "MCP server listening at http://{bind_addr}/mcp");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
            tracing::info!("shutting down HTTP server");
        })
        .await?;

    Ok(())
}

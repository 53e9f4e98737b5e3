//! prodstore - Product Collection Server
//!
//! Serves a persisted product collection to clients over chunked UDP.

use prodstore_protocol::commands;
use prodstore_server::{build_registry, Config, Server, ServerConfig};
use prodstore_storage::{DumpManager, ProductRepository};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Exit status when the stored collection fails validation.
const EXIT_INVALID_COLLECTION: i32 = 2;

/// Commands that change the collection and trigger a save.
const MUTATING_COMMANDS: &[&str] = &[
    commands::ADD,
    commands::UPDATE,
    commands::REMOVE_BY_ID,
    commands::CLEAR,
    commands::ADD_IF_MAX,
    commands::ADD_IF_MIN,
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration (from file if PRODSTORE_CONFIG is set, then env overrides)
    let config = match Config::load() {
        Ok(c) => {
            if let Ok(path) = std::env::var("PRODSTORE_CONFIG") {
                tracing::info!("Loaded config from {}", path);
            }
            c
        }
        Err(e) => {
            tracing::error!("Failed to load config: {}", e);
            return Err(e.into());
        }
    };

    tracing::info!("Starting prodstore server");
    tracing::info!("  Bind address: {}", config.network.bind_addr);
    tracing::info!("  Data file: {}", config.storage.data_file.display());
    tracing::info!(
        "  Transport: {} framing, {} byte packets",
        config.transport.framing,
        config.transport.packet_size
    );

    let repo = match ProductRepository::open(DumpManager::new(&config.storage.data_file)) {
        Ok(repo) => Arc::new(repo),
        Err(e) => {
            tracing::error!("Failed to load collection: {}", e);
            std::process::exit(EXIT_INVALID_COLLECTION);
        }
    };
    if let Err(e) = repo.validate_all() {
        tracing::error!("Stored collection is invalid: {}", e);
        std::process::exit(EXIT_INVALID_COLLECTION);
    }
    tracing::info!("  Products: {}", repo.len());

    let registry = Arc::new(build_registry(repo.clone()));
    let server = {
        let repo = repo.clone();
        Arc::new(
            Server::new(ServerConfig::from(&config), registry).with_after_hook(
                move |request, response| {
                    if response.is_ok() && MUTATING_COMMANDS.contains(&request.command.as_str()) {
                        if let Err(e) = repo.save() {
                            tracing::error!("Failed to save collection: {}", e);
                        }
                    }
                },
            ),
        )
    };

    // Handle shutdown signal
    {
        let server = server.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Received shutdown signal");
                server.shutdown();
            }
        });
    }

    if let Err(e) = server.run().await {
        tracing::error!("Server error: {}", e);
        return Err(e.into());
    }

    repo.save()?;
    tracing::info!("Collection saved, shutdown complete");
    Ok(())
}

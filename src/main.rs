//! EmberKV server binary.
//!
//! Parses flags, optionally seeds the keyspace from the configured RDB
//! snapshot, then accepts connections until Ctrl+C.

use clap::Parser;
use emberkv::commands::CommandHandler;
use emberkv::config::ServerConfig;
use emberkv::connection::handle_connection;
use emberkv::snapshot::SnapshotReader;
use emberkv::storage::{ExpiryConfig, ExpirySweeper, StorageEngine};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::parse();

    let default_level = if config.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    fmt().with_env_filter(filter).with_target(false).init();

    info!(version = emberkv::VERSION, "Starting EmberKV");

    let storage = Arc::new(build_storage(&config));

    let _sweeper = config.sweep_interval().map(|interval| {
        ExpirySweeper::start(Arc::clone(&storage), ExpiryConfig { interval })
    });

    let listener = TcpListener::bind(config.bind_address()).await?;
    info!(address = %config.bind_address(), "Listening");

    let command_handler = CommandHandler::new(Arc::clone(&storage), Arc::new(config));

    tokio::select! {
        _ = accept_loop(listener, command_handler) => {}
        result = signal::ctrl_c() => {
            if let Err(e) = result {
                error!(error = %e, "Failed to listen for Ctrl+C");
            }
            info!("Shutdown signal received, stopping server...");
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Creates the storage engine, attaching and preloading the snapshot when
/// one is configured. A missing or unreadable snapshot is logged, not fatal.
fn build_storage(config: &ServerConfig) -> StorageEngine {
    let Some(path) = config.snapshot_path() else {
        return StorageEngine::new();
    };

    let storage = StorageEngine::with_snapshot(SnapshotReader::new(path));
    let Some(reader) = storage.snapshot() else {
        return storage;
    };
    let path = reader.path().display().to_string();

    if config.no_preload {
        info!(path = %path, "Serving snapshot read-through");
        return storage;
    }

    match storage.load_snapshot(reader) {
        Ok(loaded) => info!(path = %path, keys = loaded, "Loaded snapshot"),
        Err(e) if e.is_not_found() => info!(path = %path, "No snapshot file, starting empty"),
        Err(e) => warn!(path = %path, error = %e, "Failed to load snapshot"),
    }

    storage
}

async fn accept_loop(listener: TcpListener, command_handler: CommandHandler) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let handler = command_handler.clone();
                tokio::spawn(async move {
                    handle_connection(stream, addr, handler).await;
                });
            }
            Err(e) => {
                error!(error = %e, "Failed to accept connection");
            }
        }
    }
}

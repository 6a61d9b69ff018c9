//! Juncture Daemon (junctured)
//!
//! Serves the command bridge and the durable state document over WebSocket.
//!
//! # Usage
//!
//! ```bash
//! # Start with defaults (port 3000, ./state.json)
//! junctured
//!
//! # Custom port and state file
//! junctured --port 7000 --state-file /var/lib/juncture/state.json
//!
//! # Broadcast a progress counter every 100ms
//! junctured --progress-interval-ms 100
//!
//! # With configuration file
//! junctured --config /etc/juncture/juncture.toml
//! ```

mod commands;
mod config;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use juncture_core::{CommandBridge, Hub, StateStore};
use juncture_storage::FileStorage;
use juncture_transport::{ServerConfig, WebSocketServer};

use crate::config::{Args, FileConfig, Settings};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    print_banner();

    let file_config = match &args.config {
        Some(path) => {
            info!(path = %path.display(), "Loading configuration file");
            FileConfig::from_path(path)?
        }
        None => FileConfig::default(),
    };
    let settings = Settings::resolve(&args, file_config)?;

    // Load state, restoring defaults if the file is missing or corrupt
    let storage = Arc::new(FileStorage::new(&settings.state_file));
    let store = Arc::new(StateStore::load(storage, settings.defaults.clone()).await);

    let hub = Arc::new(Hub::new());
    let bridge = Arc::new(CommandBridge::new(hub));
    commands::register_builtin(&bridge, store.clone())?;

    info!(
        addr = %settings.addr,
        state_file = %settings.state_file.display(),
        commands = ?bridge.commands(),
        "Starting Juncture daemon"
    );

    let mut handles = Vec::new();

    let server = WebSocketServer::new(
        bridge.clone(),
        ServerConfig::new(settings.addr).with_max_message_size(settings.max_message_size),
    );
    let listener = server
        .bind()
        .await
        .with_context(|| format!("Failed to bind {}", settings.addr))?;
    handles.push(tokio::spawn(async move {
        if let Err(e) = server.serve(listener).await {
            tracing::error!(error = %e, "WebSocket server error");
        }
    }));

    if let Some(interval) = settings.progress_interval {
        info!(interval_ms = interval.as_millis() as u64, "Progress broadcast enabled");
        handles.push(commands::spawn_progress(bridge.clone(), interval));
    }

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");

    for handle in handles {
        handle.abort();
    }
    store.save().await;

    Ok(())
}

fn print_banner() {
    println!(
        r#"
  ╦╦ ╦╔╗╔╔═╗╔╦╗╦ ╦╦═╗╔═╗
  ║║ ║║║║║   ║ ║ ║╠╦╝║╣
 ╚╝╚═╝╝╚╝╚═╝ ╩ ╚═╝╩╚═╚═╝
  Command bridge and state server
  Version {}
"#,
        env!("CARGO_PKG_VERSION")
    );
}

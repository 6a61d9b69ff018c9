//! Daemon configuration: command line, environment and TOML file

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use juncture_core::Document;
use juncture_protocol::MAX_FRAME_SIZE;
use serde::Deserialize;

const DEFAULT_BIND: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_STATE_FILE: &str = "state.json";

/// Juncture Daemon - command bridge and state server
#[derive(Parser, Debug)]
#[command(name = "junctured")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// WebSocket port to listen on [default: 3000]
    #[arg(long, env = "JUNCTURE_PORT")]
    pub port: Option<u16>,

    /// Bind address [default: 0.0.0.0]
    #[arg(long, env = "JUNCTURE_BIND")]
    pub bind: Option<String>,

    /// State file path [default: state.json]
    #[arg(long, env = "JUNCTURE_STATE_FILE")]
    pub state_file: Option<PathBuf>,

    /// Configuration file path
    #[arg(short, long, env = "JUNCTURE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "JUNCTURE_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Largest accepted inbound message in bytes [default: 100000000]
    #[arg(long, env = "JUNCTURE_MAX_MESSAGE_SIZE")]
    pub max_message_size: Option<usize>,

    /// Broadcast a "progress" counter every N milliseconds (0 = disabled)
    #[arg(long, env = "JUNCTURE_PROGRESS_INTERVAL_MS")]
    pub progress_interval_ms: Option<u64>,
}

/// Contents of the TOML configuration file
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub server: ServerSection,
    pub state: StateSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSection {
    pub bind: Option<String>,
    pub port: Option<u16>,
    pub max_message_size: Option<usize>,
    pub progress_interval_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StateSection {
    pub path: Option<PathBuf>,
    pub defaults: Document,
}

impl FileConfig {
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

/// Effective settings after layering flags over the config file over defaults
#[derive(Debug)]
pub struct Settings {
    pub addr: SocketAddr,
    pub state_file: PathBuf,
    pub max_message_size: usize,
    pub progress_interval: Option<Duration>,
    pub defaults: Document,
}

impl Settings {
    pub fn resolve(args: &Args, file: FileConfig) -> Result<Self> {
        let bind = args
            .bind
            .clone()
            .or(file.server.bind)
            .unwrap_or_else(|| DEFAULT_BIND.to_string());
        let port = args.port.or(file.server.port).unwrap_or(DEFAULT_PORT);
        let addr: SocketAddr = format!("{}:{}", bind, port)
            .parse()
            .with_context(|| format!("Invalid bind address {}:{}", bind, port))?;

        let progress_ms = args
            .progress_interval_ms
            .or(file.server.progress_interval_ms)
            .unwrap_or(0);

        Ok(Self {
            addr,
            state_file: args
                .state_file
                .clone()
                .or(file.state.path)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_FILE)),
            max_message_size: args
                .max_message_size
                .or(file.server.max_message_size)
                .unwrap_or(MAX_FRAME_SIZE),
            progress_interval: (progress_ms > 0).then(|| Duration::from_millis(progress_ms)),
            defaults: file.state.defaults,
        })
    }
}

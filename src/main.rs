//! Deadline server
//!
//! Serves a small table of endpoints, each of which runs an explicit request
//! lifecycle with its own read and write deadlines.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request     ┌─────────┐    ┌─────────┐    ┌──────────┐    ┌──────────┐
//!     ──────────────────▶│   net   │───▶│  http   │───▶│ handlers │───▶│ exchange │
//!                        │listener │    │ server  │    │ (shapes) │    │lifecycle │
//!                        └─────────┘    └─────────┘    └──────────┘    └────┬─────┘
//!                                            ▲                              │
//!     Client Response                        │   respond / abort / log      │
//!     ◀──────────────────────────────────────┴──────────────────────────────┘
//!
//!     Cross-cutting: config (TOML) · observability (tracing, metrics) · lifecycle (signals)
//! ```

use clap::Parser;
use std::path::PathBuf;

use deadline_server::config::{load_config, validate_config, ConfigError, ServerConfig};
use deadline_server::lifecycle::{spawn_signal_handler, Shutdown};
use deadline_server::net::Listener;
use deadline_server::observability::{logging, metrics};
use deadline_server::HttpServer;

#[derive(Parser)]
#[command(name = "deadline-server")]
#[command(about = "HTTP server with per-request read and write deadlines", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
        validate_config(&config).map_err(ConfigError::Validation)?;
    }

    logging::init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "deadline-server starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        endpoints = config.endpoints.len(),
        header_read_secs = config.timeouts.header_read_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(error) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %error,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = Listener::bind(&config.listener).await?;

    let shutdown = Shutdown::new();
    let shutdown_rx = shutdown.subscribe();
    spawn_signal_handler(shutdown);

    let server = HttpServer::new(config);
    server.run(listener, shutdown_rx).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

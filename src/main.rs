//! oo-router
//!
//! Serves the demo dispatcher tree over HTTP and WebSocket.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──▶ axum (trace, request id, timeout, body limit)
//!                  │
//!                  ├─ plain request ──▶ dispatch ──▶ 200 JSON / error status
//!                  │
//!                  └─ ws upgrade ──▶ handshake ──▶ dispatch (verb `ws`)
//!                                                    └─▶ MessageHandler session
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use oo_router::config::{load_config, ServerConfig};
use oo_router::lifecycle::{signals, Shutdown};
use oo_router::observability::{logging, metrics};
use oo_router::{demo, HttpServer};

#[derive(Parser)]
#[command(name = "oo-router")]
#[command(about = "Convention-based HTTP/WebSocket dispatcher", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
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
    }

    logging::init(&config.observability.log_filter);
    tracing::info!("oo-router v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_hops = config.dispatch.max_hops,
        max_body_bytes = config.dispatch.max_body_bytes,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    let server = HttpServer::new(config, demo::root());
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

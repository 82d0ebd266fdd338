//! ESA renewal service.
//!
//! # Architecture Overview
//!
//! ```text
//!   operator ──POST /api/jobs──────────▶ http::jobs ──▶ jobs::store (parameters)
//!
//!   operator ◀──SSE /api/jobs/{id}/stream── http::jobs
//!                                             │ spawn
//!                                             ▼
//!                                        jobs::runner ──▶ rpc::client ──▶ vendor API
//!                                             │              (rpc::signer)
//!                                             ▼
//!                                        events::emitter
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use esa_renew::config::{load_config, ServiceConfig};
use esa_renew::observability::{logging, metrics};
use esa_renew::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "esa-renewd")]
#[command(about = "Renewal job service with live progress streaming", long_about = None)]
struct Args {
    /// Path to a TOML configuration file; defaults are used when omitted.
    #[arg(short, long, env = "ESA_RENEW_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };

    logging::init_tracing(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "esa-renewd starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        vendor = %config.vendor.endpoint,
        store = ?config.store.backend,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    shutdown.trigger_on_signals();

    let server = HttpServer::new(config)?;
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

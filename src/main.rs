//! Pool Warden daemon.
//!
//! Keeps one pooled connection to a backing service alive and reports on it.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────┐
//!                 │                   POOL WARDEN                     │
//!                 │                                                   │
//!   SIGTERM ──────┼─▶ ShutdownCoordinator ──drain/close──┐            │
//!   SIGINT        │                                      ▼            │
//!                 │   HealthMonitor ──results──▶ ConnectionManager ───┼──▶ Backing
//!                 │        │                      │  state machine    │    Service
//!                 │        └──────probe───────────┤  backoff/retry    │
//!                 │                               │  leases           │
//!   GET /health ──┼─▶ HealthServer ──report───────┘                   │
//!                 │                                                   │
//!                 │   config · logging · metrics                      │
//!                 └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use pool_warden::config::{load_config, WardenConfig};
use pool_warden::observability::{logging, metrics};
use pool_warden::Warden;

#[derive(Parser)]
#[command(name = "pool-warden")]
#[command(about = "Pooled connection lifecycle manager", long_about = None)]
struct Args {
    /// Path to a TOML config file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the backing-service URL.
    #[arg(short, long)]
    url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => WardenConfig::default(),
    };
    if let Some(url) = args.url {
        config.target.url = url;
    }

    logging::init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "pool-warden starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let outcome = Warden::build(config)?.run().await?;

    tracing::info!(
        reason = %outcome.reason,
        forced = outcome.forced,
        outstanding = outcome.outstanding,
        "Shutdown complete"
    );
    Ok(())
}

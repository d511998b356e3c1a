//! # pw-runner
//!
//! Main entry point for pricewatch.
//!
//! Loads a JSON configuration file, starts the price server (with its trade
//! feed) and/or the board poller, and stops them on Ctrl+C.
//!
//! # Usage
//!
//! ```bash
//! pw-runner config.json --log-level info
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, bail};
use clap::Parser;
use pw_board::PricePoller;
use pw_core::{PriceStore, Service};
use pw_server::PriceServer;
use tracing::{error, info, warn};

/// Live price board: exchange trade feed, price server and polling renderer.
#[derive(Parser)]
#[command(name = "pw-runner", about = "Live price board runner")]
struct Cli {
    /// Configuration file path (JSON).
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Log directory for file output; overrides `logging.log_path`.
    #[arg(long)]
    log_dir: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Load configuration (before logging, which it configures)
    let config = pw_core::config::load_config(&cli.config)?;

    // 2. Initialize logging
    let log_dir = cli.log_dir.clone().or_else(|| config.log_path());
    let _log_guard = pw_core::logging::init_logging(&cli.log_level, log_dir.as_deref(), &config.module_name())?;
    info!("pw-runner starting, config={}, log_level={}", cli.config.display(), cli.log_level);

    // 3. Build services from the configured sections
    let store = Arc::new(PriceStore::new());
    let mut services: Vec<Box<dyn Service>> = Vec::new();

    if let Some(server_cfg) = &config.server {
        services.push(Box::new(PriceServer::new(server_cfg, config.board.as_ref(), store.clone())?));
    }
    if let Some(board_cfg) = &config.board {
        services.push(Box::new(PricePoller::from_config(board_cfg)?));
    }
    if services.is_empty() {
        bail!("nothing to run: config has neither a 'server' nor a 'board' section");
    }

    // 4. Start in order: the server first so the board's first poll can reach it
    for idx in 0..services.len() {
        if let Err(e) = services[idx].start().await {
            error!("failed to start '{}': {e:#}", services[idx].name());
            stop_all(&mut services[..idx]).await;
            return Err(e);
        }
        info!("service '{}' started", services[idx].name());
    }

    info!("all {} service(s) started, press Ctrl+C to stop", services.len());

    // 5. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    // 6. Stop in reverse order
    stop_all(&mut services).await;

    info!("all services stopped");
    Ok(())
}

async fn stop_all(services: &mut [Box<dyn Service>]) {
    for service in services.iter_mut().rev() {
        info!("stopping service '{}'", service.name());
        if let Err(e) = service.stop().await {
            warn!("error stopping '{}': {e}", service.name());
        }
    }
}

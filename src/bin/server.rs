//! Headless FX signal server.
//!
//! Connects to the broker, warms up candle history, and keeps the TFQE and
//! multi-timeframe snapshots refreshed until Ctrl+C.
//!
//! # Environment Variables
//! - `GMO_API_KEY` / `GMO_API_SECRET` - credentials; omit for public-only mode
//! - `TRADING_ENABLED` - unlock the order endpoints (default: false)
//! - `SYMBOLS` - comma-separated pair list (default: USD_JPY,EUR_USD,EUR_JPY,GBP_JPY)

use anyhow::Result;
use rustfx::application::system::Application;
use rustfx::config::Config;
use tracing::{Level, info};
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(stdout_layer)
        .init();

    info!("rustfx server {} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    info!(
        "Configuration loaded: symbols={:?}, trading_enabled={}",
        config.symbols, config.trading_enabled
    );

    let app = Application::build(config)?;
    let handle = app.start().await?;
    info!("Signal engine running. Press Ctrl+C to shutdown.");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received.");
    handle.shutdown().await;

    Ok(())
}

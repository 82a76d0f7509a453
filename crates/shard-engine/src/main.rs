//! # Shardstorm
//!
//! Headless runner for the destructible voxel enemy simulation.
//!
//! Usage: `shardstorm [CONFIG] [--json-logs] [--write-config]`
//!
//! - `CONFIG`: TOML file, defaults to `shardstorm.toml`
//! - `--json-logs`: emit log lines as JSON
//! - `--write-config`: write the effective configuration to `CONFIG` and exit

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod app;
mod config;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{EngineConfig, CONFIG_FILE};

/// Command line options.
#[derive(Parser, Debug)]
#[command(name = "shardstorm", version)]
#[command(about = "Headless destructible voxel enemy simulation")]
struct Args {
    /// TOML config file (defaults to `shardstorm.toml`)
    config: Option<PathBuf>,

    /// Emit log lines as JSON
    #[arg(long)]
    json_logs: bool,

    /// Write the effective configuration to the config path and exit
    #[arg(long)]
    write_config: bool,
}

/// Main entry point.
fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::from_default_env().add_directive("shard=info".parse()?);
    tracing_subscriber::registry()
        .with(filter)
        .with(args.json_logs.then(|| fmt::layer().json()))
        .with((!args.json_logs).then(fmt::layer))
        .init();

    info!("Shardstorm starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let path = args.config.unwrap_or_else(|| PathBuf::from(CONFIG_FILE));
    let mut config = EngineConfig::load_from(&path);
    config.validate();

    if args.write_config {
        config.save_to(&path)?;
        return Ok(());
    }

    let summary = app::run(&config)?;
    app::write_summary(&config, &summary)?;

    info!("Shardstorm shutdown complete");
    Ok(())
}

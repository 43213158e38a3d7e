// src/main.rs

//! vmkeeper
//!
//! Entry point for the vmkeeper CLI.
//!
//! This binary orchestrates data-protection operations (backup, restore,
//! archive maintenance) over virtualization first-class objects. It
//! delegates all real work to the `runner` module.
//!
//! Responsibilities of this file:
//! - Initialise tracing
//! - Parse CLI arguments
//! - Hand off execution to the runner
//!
//! There is intentionally *no business logic* here.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use vmkeeper::{cli, runner};

/// Program entry point.
///
/// Uses Tokio because the engine fans operations out over bounded worker
/// pools and the `serve` command runs an async HTTP server.
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_target(false)
        .init();

    // Parse CLI arguments (operations / serve / init)
    let cli = cli::Cli::parse();

    // Delegate execution to the runner
    runner::run(cli).await
}

mod config;

use anyhow::{Context, Result};
use clap::Parser;
use config::{CliConfig, Config};
use std::io;
use tracing::{info, warn};
use transfer_engine::Simulation;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = CliConfig::parse();

    run_simulation(&config)?;

    info!("Simulation completed");

    Ok(())
}

fn run_simulation<C: Config>(config: &C) -> Result<()> {
    let simulation =
        Simulation::new(config.simulation_config()).context("Invalid simulation configuration")?;

    let summary = simulation
        .run(io::stdout())
        .context("Simulation failed to run")?;

    info!(
        total = summary.total,
        transfers = summary.transfers,
        attempts = summary.attempts,
        reporter_ticks = summary.reporter_ticks,
        elapsed = ?summary.elapsed,
        "Final ledger state"
    );

    if !summary.is_conserved() {
        warn!(
            total = summary.total,
            expected = summary.expected_total,
            "Total funds changed during the run"
        );
    }

    if summary.stragglers > 0 {
        warn!(
            stragglers = summary.stragglers,
            "Some threads were still running at exit"
        );
    }

    Ok(())
}

use clap::Parser;
use std::time::Duration;
use transfer_engine::simulation::{default_parallelism, SimulationConfig};

/// Trait for reading configuration parameters
pub trait Config {
    fn accounts(&self) -> usize;
    fn initial_amount(&self) -> u64;
    fn duration(&self) -> Duration;
    fn report_interval(&self) -> Duration;
    fn workers(&self) -> usize;
    fn seed(&self) -> Option<u64>;
    fn shutdown_grace(&self) -> Duration;

    fn simulation_config(&self) -> SimulationConfig {
        SimulationConfig::default()
            .with_accounts(self.accounts())
            .with_initial_amount(self.initial_amount())
            .with_duration(self.duration())
            .with_report_interval(self.report_interval())
            .with_workers(self.workers())
            .with_seed(self.seed())
            .with_shutdown_grace(self.shutdown_grace())
    }
}

/// CLI configuration
#[derive(Parser, Debug)]
#[command(
    name = "bank-transfers",
    about = "Runs concurrent random transfers between accounts and checks that total funds never change",
    version
)]
pub struct CliConfig {
    /// Number of accounts in the ledger
    #[arg(long, default_value_t = 10_000)]
    accounts: usize,

    /// Starting balance of every account
    #[arg(long, default_value_t = 1_000)]
    initial_amount: u64,

    /// How long to run (e.g. "15s", "2m")
    #[arg(short, long, default_value = "15s")]
    duration: humantime::Duration,

    /// Interval between stats lines
    #[arg(long, default_value = "1s")]
    report_interval: humantime::Duration,

    /// Number of worker threads [default: available parallelism]
    #[arg(short, long)]
    workers: Option<usize>,

    /// Seed for reproducible worker random streams
    #[arg(long)]
    seed: Option<u64>,

    /// How long to wait for threads to stop after the run ends
    #[arg(long, default_value = "5s")]
    shutdown_grace: humantime::Duration,
}

impl Config for CliConfig {
    fn accounts(&self) -> usize {
        self.accounts
    }

    fn initial_amount(&self) -> u64 {
        self.initial_amount
    }

    fn duration(&self) -> Duration {
        *self.duration
    }

    fn report_interval(&self) -> Duration {
        *self.report_interval
    }

    fn workers(&self) -> usize {
        self.workers.unwrap_or_else(default_parallelism)
    }

    fn seed(&self) -> Option<u64> {
        self.seed
    }

    fn shutdown_grace(&self) -> Duration {
        *self.shutdown_grace
    }
}

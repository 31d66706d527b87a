//! Lifecycle of a timed run: spawn workers and the reporter, wait out the
//! run duration, cancel, and join within a grace period

use crate::error::SimulationError;
use crate::ledger::Ledger;
use crate::reporter::Reporter;
use crate::shutdown::{self, ShutdownListener};
use crate::worker::{worker_rng, Worker, WorkerReport};
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use std::io::Write;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{info, warn};

pub const DEFAULT_ACCOUNTS: usize = 10_000;
pub const DEFAULT_INITIAL_AMOUNT: u64 = 1_000;
pub const DEFAULT_DURATION: Duration = Duration::from_secs(15);
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Hardware parallelism, or 1 if it cannot be determined
pub fn default_parallelism() -> usize {
    thread::available_parallelism().map_or(1, NonZeroUsize::get)
}

/// Configuration for a simulation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationConfig {
    pub accounts: usize,
    pub initial_amount: u64,
    pub duration: Duration,
    pub report_interval: Duration,
    pub workers: usize,
    /// Seed for reproducible worker RNG streams
    pub seed: Option<u64>,
    /// How long to wait for threads after cancellation before giving up on them
    pub shutdown_grace: Duration,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            accounts: DEFAULT_ACCOUNTS,
            initial_amount: DEFAULT_INITIAL_AMOUNT,
            duration: DEFAULT_DURATION,
            report_interval: DEFAULT_REPORT_INTERVAL,
            workers: default_parallelism(),
            seed: None,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

impl SimulationConfig {
    pub const fn with_accounts(mut self, accounts: usize) -> Self {
        self.accounts = accounts;
        self
    }

    pub const fn with_initial_amount(mut self, initial_amount: u64) -> Self {
        self.initial_amount = initial_amount;
        self
    }

    pub const fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub const fn with_report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }

    pub const fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub const fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub const fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }
}

/// Outcome of a finished run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationSummary {
    pub total: u64,
    pub expected_total: u64,
    /// Completed transfers according to the ledger counter
    pub transfers: u64,
    /// Completed transfers as counted by the workers that were joined
    pub worker_completed: u64,
    /// Transfer requests issued by the workers that were joined
    pub attempts: u64,
    pub reporter_ticks: u64,
    /// Threads that did not exit within the grace period
    pub stragglers: usize,
    pub elapsed: Duration,
}

impl SimulationSummary {
    pub const fn is_conserved(&self) -> bool {
        self.total == self.expected_total
    }
}

/// Dropped when the owning thread exits, however it exits
struct ExitGuard {
    _exit: Sender<()>,
}

pub struct Simulation {
    config: SimulationConfig,
    ledger: Arc<Ledger>,
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> Result<Self, SimulationError> {
        if config.workers == 0 {
            return Err(SimulationError::NoWorkers);
        }

        if config.report_interval.is_zero() {
            return Err(SimulationError::ZeroReportInterval);
        }

        let ledger = Arc::new(Ledger::new(config.accounts, config.initial_amount)?);

        Ok(Self { config, ledger })
    }

    pub const fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    /// Run for the configured duration, writing stats lines to `output`
    pub fn run<W>(self, output: W) -> Result<SimulationSummary, SimulationError>
    where
        W: Write + Send + 'static,
    {
        let Self { config, ledger } = self;
        let (shutdown, listener) = shutdown::channel();
        let (exit_tx, exit_rx) = bounded::<()>(0);
        let started = Instant::now();

        info!(
            accounts = config.accounts,
            initial_amount = config.initial_amount,
            workers = config.workers,
            duration = ?config.duration,
            "Starting simulation"
        );

        let mut workers = Vec::with_capacity(config.workers);
        for id in 0..config.workers {
            let worker = Worker::new(id, Arc::clone(&ledger), worker_rng(config.seed, id));
            let handle = spawn_tracked(
                format!("transfer-worker-{id}"),
                &exit_tx,
                listener.clone(),
                move |listener| worker.run(&listener),
            )?;
            workers.push(handle);
        }

        let reporter = Reporter::new(Arc::clone(&ledger), output, config.report_interval);
        let reporter = spawn_tracked(
            "reporter".to_owned(),
            &exit_tx,
            listener,
            move |listener| reporter.run(&listener),
        )?;

        thread::sleep(config.duration);

        info!("Run duration elapsed, stopping workers");
        shutdown.trigger();
        drop(exit_tx);

        let all_exited = wait_for_exit(&exit_rx, config.shutdown_grace);
        if !all_exited {
            warn!(
                grace = ?config.shutdown_grace,
                "Not all threads stopped within the grace period"
            );
        }

        let mut stragglers = 0;
        let mut attempts = 0;
        let mut worker_completed = 0;

        for handle in workers {
            if let Some(WorkerReport {
                attempts: a,
                completed,
            }) = join_thread(handle, all_exited, &mut stragglers)
            {
                attempts += a;
                worker_completed += completed;
            }
        }

        let reporter_ticks = join_thread(reporter, all_exited, &mut stragglers).unwrap_or_default();

        Ok(SimulationSummary {
            total: ledger.snapshot_sum()?,
            expected_total: ledger.expected_total(),
            transfers: ledger.transfer_count(),
            worker_completed,
            attempts,
            reporter_ticks,
            stragglers,
            elapsed: started.elapsed(),
        })
    }
}

fn spawn_tracked<T, F>(
    name: String,
    exit_tx: &Sender<()>,
    listener: ShutdownListener,
    body: F,
) -> Result<JoinHandle<T>, SimulationError>
where
    T: Send + 'static,
    F: FnOnce(ShutdownListener) -> T + Send + 'static,
{
    let exit = ExitGuard {
        _exit: exit_tx.clone(),
    };

    let handle = thread::Builder::new().name(name).spawn(move || {
        let _exit = exit;
        body(listener)
    })?;

    Ok(handle)
}

/// Block until every exit guard is dropped or `grace` runs out
fn wait_for_exit(exit_rx: &crossbeam_channel::Receiver<()>, grace: Duration) -> bool {
    let deadline = Instant::now() + grace;

    loop {
        match exit_rx.recv_deadline(deadline) {
            Ok(()) => {}
            Err(RecvTimeoutError::Disconnected) => return true,
            Err(RecvTimeoutError::Timeout) => return false,
        }
    }
}

/// Join a thread. After a clean exit every body has returned, so the join is
/// prompt; after a timed-out grace period a still-running thread is left
/// detached and counted as a straggler
fn join_thread<T>(handle: JoinHandle<T>, all_exited: bool, stragglers: &mut usize) -> Option<T> {
    let name = handle.thread().name().unwrap_or("unnamed").to_owned();

    if !all_exited && !handle.is_finished() {
        warn!(thread = %name, "Thread still running after shutdown, detaching");
        *stragglers += 1;
        return None;
    }

    match handle.join() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(thread = %name, "Thread panicked before shutdown");
            None
        }
    }
}

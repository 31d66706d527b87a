use crate::ledger::Ledger;
use crate::shutdown::ShutdownListener;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use tracing::{debug, warn};

/// Per-worker RNG. With a seed, each worker gets its own ChaCha stream so
/// runs are reproducible per worker; without one, it is seeded from entropy
pub fn worker_rng(seed: Option<u64>, worker: usize) -> ChaCha8Rng {
    match seed {
        Some(seed) => {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            rng.set_stream(worker as u64);
            rng
        }
        None => ChaCha8Rng::from_entropy(),
    }
}

/// What a worker did before it stopped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerReport {
    /// Transfer requests issued, including no-ops
    pub attempts: u64,
    /// Transfers that actually moved funds
    pub completed: u64,
}

/// Issues random transfers against a shared ledger until told to stop
pub struct Worker<R> {
    id: usize,
    ledger: Arc<Ledger>,
    rng: R,
}

impl<R: Rng> Worker<R> {
    pub const fn new(id: usize, ledger: Arc<Ledger>, rng: R) -> Self {
        Self { id, ledger, rng }
    }

    /// Run until `shutdown` fires. Cancellation is checked between
    /// transfers, never while account locks are held
    pub fn run(mut self, shutdown: &ShutdownListener) -> WorkerReport {
        let mut report = WorkerReport::default();

        if self.ledger.is_empty() {
            warn!(worker = self.id, "Ledger has no accounts, worker exiting");
            return report;
        }

        debug!(worker = self.id, "Worker started");

        while !shutdown.is_triggered() {
            self.step(&mut report);
        }

        debug!(
            worker = self.id,
            attempts = report.attempts,
            completed = report.completed,
            "Worker stopped"
        );

        report
    }

    /// Issue exactly `attempts` transfer requests
    pub fn run_attempts(mut self, attempts: u64) -> WorkerReport {
        let mut report = WorkerReport::default();

        if self.ledger.is_empty() {
            return report;
        }

        for _ in 0..attempts {
            self.step(&mut report);
        }

        report
    }

    fn step(&mut self, report: &mut WorkerReport) {
        let accounts = self.ledger.len();
        let debit = self.rng.gen_range(0..accounts);
        let credit = self.rng.gen_range(0..accounts);

        report.attempts += 1;

        match self.ledger.transfer(debit, credit, &mut self.rng) {
            Ok(outcome) if outcome.is_completed() => report.completed += 1,
            Ok(_) => {}
            Err(e) => warn!(worker = self.id, "Transfer failed: {e}"),
        }
    }
}

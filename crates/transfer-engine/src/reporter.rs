use crate::error::ReporterError;
use crate::ledger::Ledger;
use crate::shutdown::ShutdownListener;
use crossbeam_channel::select;
use serde::Serialize;
use std::any::Any;
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error};

/// One line of periodic statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsRecord {
    /// Sum of all balances at snapshot time
    pub total: u64,
    /// Completed transfers so far
    pub transfers: u64,
    /// Wall time spent taking the snapshot
    pub snapshot_nanos: u64,
}

/// Periodically snapshots the ledger and writes tab-separated stats lines
pub struct Reporter<W: Write> {
    ledger: Arc<Ledger>,
    writer: csv::Writer<W>,
    interval: Duration,
}

impl<W: Write> Reporter<W> {
    pub fn new(ledger: Arc<Ledger>, output: W, interval: Duration) -> Self {
        let writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .from_writer(output);

        Self {
            ledger,
            writer,
            interval,
        }
    }

    /// Take one snapshot and write its record
    pub fn tick(&mut self) -> Result<StatsRecord, ReporterError> {
        let started = Instant::now();
        let total = self.ledger.snapshot_sum()?;
        let snapshot_nanos = u64::try_from(started.elapsed().as_nanos()).unwrap_or(u64::MAX);

        let record = StatsRecord {
            total,
            transfers: self.ledger.transfer_count(),
            snapshot_nanos,
        };

        self.writer.serialize(record)?;
        self.writer.flush()?;

        Ok(record)
    }

    /// Tick immediately, then once per interval until `shutdown` fires.
    /// A failed or panicking tick is logged and the schedule carries on.
    /// Returns the number of ticks attempted
    pub fn run(mut self, shutdown: &ShutdownListener) -> u64 {
        let ticker = crossbeam_channel::tick(self.interval);
        let mut ticks = 0;

        debug!(interval = ?self.interval, "Reporter started");

        while !shutdown.is_triggered() {
            self.guarded_tick();
            ticks += 1;

            let stopped = select! {
                recv(ticker) -> _ => false,
                recv(shutdown.closed()) -> _ => true,
            };

            if stopped {
                break;
            }
        }

        debug!(ticks, "Reporter stopped");

        ticks
    }

    fn guarded_tick(&mut self) {
        let expected = self.ledger.expected_total();

        match panic::catch_unwind(AssertUnwindSafe(|| self.tick())) {
            Ok(Ok(record)) if record.total != expected => {
                error!(
                    total = record.total,
                    expected, "Conservation check failed: total funds changed"
                );
            }
            Ok(Ok(_)) => {}
            Ok(Err(e)) => error!("Reporter tick failed: {e}"),
            Err(payload) => error!("Reporter tick panicked: {}", panic_message(&*payload)),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

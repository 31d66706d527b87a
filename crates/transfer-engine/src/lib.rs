pub mod account;
pub mod error;
pub mod ledger;
pub mod reporter;
pub mod shutdown;
pub mod simulation;
pub mod worker;

pub use error::{LedgerError, ReporterError, SimulationError};
pub use ledger::{Ledger, TransferOutcome};
pub use simulation::{Simulation, SimulationConfig, SimulationSummary};

use rand::Rng;

/// Apply a sequence of `(debit, credit)` transfers to `ledger` on the
/// current thread and return how many of them moved funds
pub fn apply_transfers<R: Rng + ?Sized>(
    ledger: &Ledger,
    transfers: impl IntoIterator<Item = (usize, usize)>,
    rng: &mut R,
) -> Result<u64, LedgerError> {
    let mut completed = 0;

    for (debit, credit) in transfers {
        if ledger.transfer(debit, credit, rng)?.is_completed() {
            completed += 1;
        }
    }

    Ok(completed)
}

use crate::account::Account;
use crate::error::LedgerError;
use parking_lot::MutexGuard;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};

/// Result of a single transfer request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    /// Funds moved from the debit account to the credit account
    Completed { amount: u64 },
    /// Debit and credit are the same account; nothing happened
    SelfTransfer,
    /// Debit account was empty; nothing happened
    InsufficientFunds,
}

impl TransferOutcome {
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// Fixed pool of accounts plus a counter of completed transfers
///
/// Any operation that holds more than one account lock acquires them in
/// ascending index order. Transfers and snapshots both follow this rule,
/// so no cycle can form in the lock acquisition graph.
#[derive(Debug)]
pub struct Ledger {
    accounts: Box<[Account]>,
    expected_total: u64,
    transfers: AtomicU64,
}

impl Ledger {
    /// Create `accounts` accounts each funded with `initial_amount`
    pub fn new(accounts: usize, initial_amount: u64) -> Result<Self, LedgerError> {
        let expected_total = u64::try_from(accounts)
            .ok()
            .and_then(|count| count.checked_mul(initial_amount))
            .ok_or(LedgerError::TotalOverflow {
                accounts,
                initial_amount,
            })?;

        Ok(Self {
            accounts: (0..accounts).map(|_| Account::new(initial_amount)).collect(),
            expected_total,
            transfers: AtomicU64::new(0),
        })
    }

    /// Create a ledger from explicit starting balances
    pub fn with_balances(balances: Vec<u64>) -> Result<Self, LedgerError> {
        let expected_total = balances
            .iter()
            .try_fold(0u64, |sum, balance| sum.checked_add(*balance))
            .ok_or(LedgerError::SumOverflow)?;

        Ok(Self {
            accounts: balances.into_iter().map(Account::new).collect(),
            expected_total,
            transfers: AtomicU64::new(0),
        })
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Total funds the ledger was created with. Never changes
    pub const fn expected_total(&self) -> u64 {
        self.expected_total
    }

    /// Number of completed (non-skipped) transfers so far
    pub fn transfer_count(&self) -> u64 {
        self.transfers.load(Ordering::Relaxed)
    }

    /// Move a random amount in `[1, debit balance]` from `debit` to `credit`
    ///
    /// Self-transfers and transfers out of an empty account are no-ops and
    /// leave the transfer counter untouched.
    pub fn transfer<R: Rng + ?Sized>(
        &self,
        debit: usize,
        credit: usize,
        rng: &mut R,
    ) -> Result<TransferOutcome, LedgerError> {
        let debit_account = self.account(debit)?;
        let credit_account = self.account(credit)?;

        // The mutex is not re-entrant, so the same account must not be locked twice.
        if debit == credit {
            return Ok(TransferOutcome::SelfTransfer);
        }

        let (mut debit_balance, mut credit_balance) = if debit < credit {
            let debit_balance = debit_account.lock();
            let credit_balance = credit_account.lock();
            (debit_balance, credit_balance)
        } else {
            let credit_balance = credit_account.lock();
            let debit_balance = debit_account.lock();
            (debit_balance, credit_balance)
        };

        if *debit_balance == 0 {
            return Ok(TransferOutcome::InsufficientFunds);
        }

        let amount = rng.gen_range(1..=*debit_balance);
        *debit_balance -= amount;
        *credit_balance += amount;

        drop(debit_balance);
        drop(credit_balance);

        self.transfers.fetch_add(1, Ordering::Relaxed);

        Ok(TransferOutcome::Completed { amount })
    }

    /// Sum every balance while holding every account lock
    ///
    /// Locks are taken in ascending index order and released only after
    /// the last balance is read, so no in-flight transfer can be observed
    /// half-applied. An empty ledger sums to zero.
    pub fn snapshot_sum(&self) -> Result<u64, LedgerError> {
        self.lock_all()
            .iter()
            .try_fold(0u64, |sum, balance| sum.checked_add(**balance))
            .ok_or(LedgerError::SumOverflow)
    }

    /// Consistent copy of all balances, taken like [`Ledger::snapshot_sum`]
    pub fn balances(&self) -> Vec<u64> {
        self.lock_all().iter().map(|balance| **balance).collect()
    }

    fn lock_all(&self) -> Vec<MutexGuard<'_, u64>> {
        self.accounts.iter().map(Account::lock).collect()
    }

    fn account(&self, index: usize) -> Result<&Account, LedgerError> {
        self.accounts.get(index).ok_or(LedgerError::IndexOutOfRange {
            index,
            len: self.accounts.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::sync::{mpsc, Arc};
    use std::thread;
    use std::time::Duration;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(7)
    }

    #[test]
    fn test_new_ledger_totals() {
        let ledger = Ledger::new(10, 1000).unwrap();

        assert_eq!(ledger.len(), 10);
        assert_eq!(ledger.expected_total(), 10_000);
        assert_eq!(ledger.snapshot_sum().unwrap(), 10_000);
        assert_eq!(ledger.transfer_count(), 0);
    }

    #[test]
    fn test_empty_ledger_sums_to_zero() {
        let ledger = Ledger::new(0, 1000).unwrap();

        assert!(ledger.is_empty());
        assert_eq!(ledger.snapshot_sum().unwrap(), 0);
        assert!(ledger.balances().is_empty());
    }

    #[test]
    fn test_total_overflow_rejected() {
        let result = Ledger::new(2, u64::MAX);

        assert_eq!(
            result.unwrap_err(),
            LedgerError::TotalOverflow {
                accounts: 2,
                initial_amount: u64::MAX
            }
        );
        assert_eq!(
            Ledger::with_balances(vec![u64::MAX, 1]).unwrap_err(),
            LedgerError::SumOverflow
        );
    }

    #[test]
    fn test_self_transfer_is_noop() {
        let ledger = Ledger::new(3, 50).unwrap();

        let outcome = ledger.transfer(1, 1, &mut rng()).unwrap();

        assert_eq!(outcome, TransferOutcome::SelfTransfer);
        assert_eq!(ledger.balances(), vec![50, 50, 50]);
        assert_eq!(ledger.transfer_count(), 0);
    }

    #[test]
    fn test_empty_debit_is_noop() {
        let ledger = Ledger::with_balances(vec![5, 0]).unwrap();

        let outcome = ledger.transfer(1, 0, &mut rng()).unwrap();

        assert_eq!(outcome, TransferOutcome::InsufficientFunds);
        assert_eq!(ledger.balances(), vec![5, 0]);
        assert_eq!(ledger.transfer_count(), 0);
    }

    #[test]
    fn test_transfer_moves_whole_single_unit() {
        let ledger = Ledger::with_balances(vec![0, 1]).unwrap();

        let outcome = ledger.transfer(1, 0, &mut rng()).unwrap();

        assert_eq!(outcome, TransferOutcome::Completed { amount: 1 });
        assert_eq!(ledger.balances(), vec![1, 0]);
        assert_eq!(ledger.transfer_count(), 1);
    }

    #[test]
    fn test_transfer_amount_bounded_by_debit_balance() {
        let ledger = Ledger::with_balances(vec![10, 0, 0]).unwrap();
        let mut rng = rng();

        for _ in 0..100 {
            let before = ledger.balances();
            match ledger.transfer(0, 2, &mut rng).unwrap() {
                TransferOutcome::Completed { amount } => {
                    assert!((1..=before[0]).contains(&amount));
                    ledger.transfer(2, 0, &mut rng).unwrap();
                }
                other => panic!("unexpected outcome {other:?}"),
            }
        }

        assert_eq!(ledger.snapshot_sum().unwrap(), 10);
        assert_eq!(ledger.transfer_count(), 200);
    }

    #[test]
    fn test_out_of_range_index() {
        let ledger = Ledger::new(2, 10).unwrap();

        let result = ledger.transfer(0, 2, &mut rng());

        assert_eq!(
            result.unwrap_err(),
            LedgerError::IndexOutOfRange { index: 2, len: 2 }
        );
        assert_eq!(ledger.balances(), vec![10, 10]);
    }

    #[test]
    fn test_seeded_sequential_transfers_conserve_funds() {
        let ledger = Ledger::new(4, 100).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut completed = 0;

        for _ in 0..1000 {
            let debit = rng.gen_range(0..ledger.len());
            let credit = rng.gen_range(0..ledger.len());

            if ledger.transfer(debit, credit, &mut rng).unwrap().is_completed() {
                completed += 1;
            }

            assert_eq!(ledger.snapshot_sum().unwrap(), 400);
            assert!(ledger.balances().iter().all(|balance| *balance <= 400));
        }

        assert_eq!(ledger.transfer_count(), completed);
    }

    #[test]
    fn test_snapshot_waits_for_held_account() {
        let ledger = Arc::new(Ledger::new(3, 10).unwrap());
        let guard = ledger.accounts[2].lock();
        let (tx, rx) = mpsc::channel();

        let reader = {
            let ledger = Arc::clone(&ledger);
            thread::spawn(move || tx.send(ledger.snapshot_sum().unwrap()).unwrap())
        };

        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());

        drop(guard);

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 30);
        reader.join().unwrap();
    }
}

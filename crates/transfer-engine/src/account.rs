use parking_lot::{Mutex, MutexGuard};

/// A single balance cell guarded by its own lock
///
/// The balance is only reachable through [`Account::lock`], so every read
/// and write is serialized by the account's mutex. The guard releases the
/// lock on every exit path.
#[derive(Debug)]
pub struct Account {
    balance: Mutex<u64>,
}

impl Account {
    pub const fn new(balance: u64) -> Self {
        Self {
            balance: Mutex::new(balance),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, u64> {
        self.balance.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_account_holds_initial_balance() {
        let account = Account::new(1000);
        assert_eq!(*account.lock(), 1000);
    }

    #[test]
    fn test_guard_writes_are_visible_after_release() {
        let account = Account::new(10);

        {
            let mut balance = account.lock();
            *balance -= 4;
        }

        assert_eq!(*account.lock(), 6);
    }

    #[test]
    fn test_lock_is_exclusive() {
        let account = Account::new(1);
        let guard = account.lock();

        assert!(account.balance.try_lock().is_none());

        drop(guard);
        assert!(account.balance.try_lock().is_some());
    }
}

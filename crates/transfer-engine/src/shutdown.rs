//! Cooperative cancellation shared by workers and the reporter

use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Create a connected trigger/listener pair
pub fn channel() -> (Shutdown, ShutdownListener) {
    let flag = Arc::new(AtomicBool::new(false));
    let (closer, closed) = bounded(0);

    (
        Shutdown {
            flag: Arc::clone(&flag),
            _closer: closer,
        },
        ShutdownListener { flag, closed },
    )
}

/// Owning side of the signal. Triggering (or dropping) it stops every listener
#[derive(Debug)]
pub struct Shutdown {
    flag: Arc<AtomicBool>,
    _closer: Sender<()>,
}

impl Shutdown {
    pub fn trigger(self) {
        drop(self);
    }
}

impl Drop for Shutdown {
    fn drop(&mut self) {
        // Flag first; the channel disconnects when `_closer` drops right after.
        self.flag.store(true, Ordering::Release);
    }
}

#[derive(Debug, Clone)]
pub struct ShutdownListener {
    flag: Arc<AtomicBool>,
    closed: Receiver<()>,
}

impl ShutdownListener {
    /// Cheap per-iteration check for busy loops
    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Never yields a message; disconnects once shutdown is triggered.
    /// Meant for `select!` alongside a timer
    pub const fn closed(&self) -> &Receiver<()> {
        &self.closed
    }
}

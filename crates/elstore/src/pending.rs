use std::sync::{Condvar, Mutex};

/// Counts dispatched background writes and lets callers wait for all of
/// them to finish.
#[derive(Debug, Default)]
pub(crate) struct PendingWrites {
    count: Mutex<usize>,
    idle: Condvar,
}

impl PendingWrites {
    pub(crate) fn begin(&self) {
        *self.count.lock().expect("lock poisoned") += 1;
    }

    pub(crate) fn finish(&self) {
        let mut count = self.count.lock().expect("lock poisoned");
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.idle.notify_all();
        }
    }

    pub(crate) fn current(&self) -> usize {
        *self.count.lock().expect("lock poisoned")
    }

    /// Block until the counter drops to zero.
    pub(crate) fn wait(&self) {
        let count = self.count.lock().expect("lock poisoned");
        let _idle = self
            .idle
            .wait_while(count, |count| *count > 0)
            .expect("lock poisoned");
    }
}

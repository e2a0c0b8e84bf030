// SPDX-License-Identifier: Apache-2.0

//! A condition-variable "trigger" a queue manager uses to let its drain
//! loop sleep until there is something to pop, waking early on push.

use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// Wraps a `Mutex<()>` + `Condvar` pair so callers can `wait` with a timeout
/// (so GC sweeps still progress, per spec §5) and `fire` to wake any
/// waiters immediately.
pub struct Trigger {
    lock: Mutex<()>,
    condvar: Condvar,
}

impl Default for Trigger {
    fn default() -> Self {
        Self::new()
    }
}

impl Trigger {
    /// Creates an unset trigger.
    #[must_use]
    pub fn new() -> Self {
        Self {
            lock: Mutex::new(()),
            condvar: Condvar::new(),
        }
    }

    /// Wakes every thread currently parked in [`Trigger::wait`].
    pub fn fire(&self) {
        self.condvar.notify_all();
    }

    /// Parks the calling thread until [`Trigger::fire`] is called or
    /// `timeout` elapses, whichever comes first.
    pub fn wait(&self, timeout: Duration) {
        let guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let _ = self.condvar.wait_timeout(guard, timeout);
    }
}

//! A `ManualResetEvent`-like one-shot gate (spec §4.6 step 3, "seek blocks
//! available"). Starts set; the seek engine resets it at the beginning of
//! a seek and sets it again once the requested target lands (or the seek
//! engine throws, spec §8 invariant 5: "the `seek-blocks-available` latch
//! ends set").

use std::time::Duration;

use parking_lot::{Condvar, Mutex};

pub(crate) struct Latch {
    set: Mutex<bool>,
    cond: Condvar,
}

impl Latch {
    pub(crate) fn new() -> Self {
        Self {
            set: Mutex::new(true),
            cond: Condvar::new(),
        }
    }

    pub(crate) fn set(&self) {
        let mut set = self.set.lock();
        *set = true;
        self.cond.notify_all();
    }

    pub(crate) fn reset(&self) {
        *self.set.lock() = false;
    }

    #[must_use]
    pub(crate) fn is_set(&self) -> bool {
        *self.set.lock()
    }

    /// Blocks up to `timeout` for the latch to become set; returns whether
    /// it is set by the time this call returns.
    pub(crate) fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut set = self.set.lock();
        if !*set {
            self.cond.wait_for(&mut set, timeout);
        }
        *set
    }
}

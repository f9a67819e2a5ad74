//! Time source abstraction.
//!
//! All timestamps in core are Unix epoch milliseconds (`i64`). Stores and
//! timers never read the system clock directly, so tests can drive time
//! explicitly through [`ManualClock`].

use std::cell::Cell;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Epoch milliseconds.
pub type EpochMs = i64;

/// One day in milliseconds.
pub const DAY_MS: EpochMs = 24 * 60 * 60 * 1000;

/// Source of "now" for stores, timers and the archive sweep.
pub trait Clock {
    fn now_ms(&self) -> EpochMs;
}

/// Wall clock backed by `SystemTime`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> EpochMs {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as EpochMs)
            .unwrap_or(0)
    }
}

/// Manually advanced clock. Clones share the same instant.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<EpochMs>>,
}

impl ManualClock {
    pub fn new(start: EpochMs) -> Self {
        Self {
            now: Rc::new(Cell::new(start)),
        }
    }

    pub fn set(&self, now: EpochMs) {
        self.now.set(now);
    }

    pub fn advance(&self, delta_ms: EpochMs) {
        self.now.set(self.now.get() + delta_ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> EpochMs {
        self.now.get()
    }
}

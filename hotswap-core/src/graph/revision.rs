//! Revision Clock
//!
//! Revisions are wall-clock milliseconds, bumped forward when the clock has
//! not advanced since the last stamp. Two stamps from the same clock are
//! never equal and never go backwards.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of monotonically increasing revision markers.
#[derive(Debug, Default)]
pub struct RevisionClock {
    last: AtomicU64,
}

impl RevisionClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Produce the next revision.
    pub fn next(&self) -> u64 {
        let now = now_millis();
        let mut last = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(last + 1);
            match self
                .last
                .compare_exchange_weak(last, candidate, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return candidate,
                Err(actual) => last = actual,
            }
        }
    }

    /// The most recently issued revision, or zero.
    pub fn last(&self) -> u64 {
        self.last.load(Ordering::Acquire)
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

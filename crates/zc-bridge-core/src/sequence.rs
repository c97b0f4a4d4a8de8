//! Send-order counter for `session.updated` events.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counter shared by every connection of one bridge.
///
/// Starts at zero on every process start; the first value handed out is 1.
#[derive(Debug, Default)]
pub struct Sequence {
    value: AtomicU64,
}

impl Sequence {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    /// Advance the counter and return the new value.
    pub fn next(&self) -> u64 {
        self.value.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Last value handed out, or zero.
    #[must_use]
    pub fn current(&self) -> u64 {
        self.value.load(Ordering::SeqCst)
    }
}

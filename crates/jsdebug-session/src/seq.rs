//! Outgoing command sequence ids.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic id source shared by every session created from it.
///
/// Ids start at 1 and are never reused, so a response that arrives after a
/// reconnect cannot be matched to a newer call.
#[derive(Debug)]
pub struct SequenceGenerator {
    next: AtomicU64,
}

impl Default for SequenceGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// The id the next call to [`next`](Self::next) would return.
    #[must_use]
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

//! Suspend-episode tokens.
//! - ContextToken: one suspend episode of the debuggee
//! - ContextTracker: owns the single current token

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

/// Generation marker minted when the debuggee suspends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextToken(u64);

impl ContextToken {
    #[must_use]
    pub fn generation(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContextToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "context#{}", self.0)
    }
}

/// Tracks the token of the current suspend episode, if any.
///
/// Superseded tokens never become current again.
#[derive(Debug, Default)]
pub struct ContextTracker {
    current: Mutex<Option<ContextToken>>,
    generation: AtomicU64,
}

impl ContextTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mints a new current token, superseding the previous one.
    pub fn suspend(&self) -> ContextToken {
        let token = ContextToken(self.generation.fetch_add(1, Ordering::Relaxed) + 1);
        *self.current.lock() = Some(token);
        token
    }

    /// Invalidates the current token and returns it.
    pub fn resume(&self) -> Option<ContextToken> {
        self.current.lock().take()
    }

    #[must_use]
    pub fn current(&self) -> Option<ContextToken> {
        *self.current.lock()
    }

    #[must_use]
    pub fn is_current(&self, token: ContextToken) -> bool {
        *self.current.lock() == Some(token)
    }

    /// Runs `f` while `token` is held current; `None` when it is already dismissed.
    ///
    /// A `None` token always runs.
    pub fn with_current<R>(&self, token: Option<ContextToken>, f: impl FnOnce() -> R) -> Option<R> {
        let Some(token) = token else {
            return Some(f());
        };
        let current = self.current.lock();
        if *current != Some(token) {
            return None;
        }
        let result = f();
        drop(current);
        Some(result)
    }

    /// Runs `f` and invalidates `token` under one lock.
    ///
    /// No other caller can observe `token` as current after `f` starts.
    pub fn invalidate_with<R>(&self, token: ContextToken, f: impl FnOnce() -> R) -> Option<R> {
        let mut current = self.current.lock();
        if *current != Some(token) {
            return None;
        }
        let result = f();
        *current = None;
        Some(result)
    }
}

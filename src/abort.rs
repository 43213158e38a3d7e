// src/abort.rs

//! Cooperative cancellation.
//!
//! The signal is a clone-able token passed explicitly to the fan-out loop
//! and every runnable command, not a process global, so tests can trigger
//! an abort deterministically. In-flight operations are never force-killed;
//! they observe the flag at their own checkpoints.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Clone, Debug, Default)]
pub struct AbortSignal {
    flag: Arc<AtomicBool>,
}

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Monotonic for the lifetime of a command
    /// invocation: once set, every later poll sees it.
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Withdraw a pending abort request. Only meaningful on the long-lived
    /// API server, between command invocations.
    pub fn clear(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let signal = AbortSignal::new();
        let other = signal.clone();
        assert!(!other.is_triggered());

        signal.trigger();
        assert!(other.is_triggered());

        other.clear();
        assert!(!signal.is_triggered());
    }
}

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::engine::action::{ActionSnapshot, ResultAction, DEFAULT_ABORT_REASON};

/// Ordered collection of the result actions for one command invocation.
///
/// Append order equals FCO resolution order. Appends may arrive from worker
/// threads on the async path; the issuing side (deciding which FCO starts
/// next) stays single-threaded per invocation.
#[derive(Debug, Default)]
pub struct ResultActionLog {
    actions: Mutex<Vec<Arc<ResultAction>>>,
    last_reason: Mutex<Option<String>>,
    quit: AtomicBool,
}

impl ResultActionLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn actions_guard(&self) -> MutexGuard<'_, Vec<Arc<ResultAction>>> {
        self.actions.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn reason_guard(&self) -> MutexGuard<'_, Option<String>> {
        self.last_reason.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn append(&self, action: Arc<ResultAction>) {
        self.actions_guard().push(action);
    }

    pub fn len(&self) -> usize {
        self.actions_guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions_guard().is_empty()
    }

    pub fn actions(&self) -> Vec<Arc<ResultAction>> {
        self.actions_guard().clone()
    }

    pub fn snapshots(&self) -> Vec<ActionSnapshot> {
        self.actions_guard().iter().map(|a| a.snapshot()).collect()
    }

    pub fn all_done(&self) -> bool {
        self.actions_guard().iter().all(|a| a.is_done())
    }

    /// Rolled-up reason for top-level reporting. Deliberately
    /// last-write-wins; the per-action reasons stay authoritative.
    pub fn record_reason(&self, reason: impl Into<String>) {
        *self.reason_guard() = Some(reason.into());
    }

    pub fn last_reason(&self) -> Option<String> {
        self.reason_guard().clone()
    }

    /// Stop issuing new units of work. Monotonic: once requested it stays
    /// requested for the lifetime of the invocation.
    pub fn request_quit(&self) {
        self.quit.store(true, Ordering::SeqCst);
    }

    pub fn quit_requested(&self) -> bool {
        self.quit.load(Ordering::SeqCst)
    }

    /// Record a user abort: rolled-up reason plus quit marker.
    pub fn mark_aborted(&self) {
        self.record_reason(DEFAULT_ABORT_REASON);
        self.request_quit();
    }
}

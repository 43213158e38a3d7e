use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use uuid::Uuid;

use crate::engine::state::OperationState;
use crate::engine::OperationKind;
use crate::fco::{EntityType, FcoRef};
use crate::ops::OperationPayload;

pub const DEFAULT_FAILURE_REASON: &str = "Check logs for more details";
pub const DEFAULT_SKIP_REASON: &str = "Skipped, check logs for more details";
pub const DEFAULT_ABORT_REASON: &str = "Operation aborted by user";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionId(pub String);

impl ActionId {
    pub fn new() -> Self {
        Self(format!("ra_{}", Uuid::new_v4()))
    }
}

impl Default for ActionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ActionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A rejected lifecycle transition.
///
/// Transitions are checked fail-fast: silently overwriting a terminal state
/// would double-count the action in statistics.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ActionStateError {
    #[error("action {id} ({target}) is already {state}, cannot {attempted}")]
    AlreadyTerminal {
        id: ActionId,
        target: String,
        state: OperationState,
        attempted: &'static str,
    },

    #[error("action {id} ({target}) must be {required} to {attempted}, found {state}")]
    InvalidTransition {
        id: ActionId,
        target: String,
        required: &'static str,
        attempted: &'static str,
        state: OperationState,
    },
}

#[derive(Debug)]
struct Inner {
    state: OperationState,
    reason: Option<String>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    payload: Option<OperationPayload>,
    done: bool,
}

/// Per-FCO record of one operation's progress and outcome.
///
/// One result action is created per selected FCO per command; the runnable
/// command executing it is the only writer for lifecycle transitions, while
/// pollers read snapshots concurrently. The state machine is
/// `Pending → Running → terminal`; `done()` is called exactly once at the
/// end of execution regardless of how the operation exited.
#[derive(Debug)]
pub struct ResultAction {
    id: ActionId,
    kind: OperationKind,
    target: FcoRef,
    created_at: DateTime<Utc>,
    progress: AtomicU8,
    inner: Mutex<Inner>,
}

/// Read-only, serializable view of a result action.
#[derive(Debug, Clone, Serialize)]
pub struct ActionSnapshot {
    pub id: ActionId,
    pub kind: OperationKind,
    pub target: FcoRef,
    pub state: OperationState,
    pub reason: Option<String>,
    pub progress: u8,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub payload: Option<OperationPayload>,
    pub done: bool,
}

impl ResultAction {
    pub fn new(kind: OperationKind, target: FcoRef) -> Self {
        Self {
            id: ActionId::new(),
            kind,
            target,
            created_at: Utc::now(),
            progress: AtomicU8::new(0),
            inner: Mutex::new(Inner {
                state: OperationState::Pending,
                reason: None,
                started_at: None,
                finished_at: None,
                payload: None,
                done: false,
            }),
        }
    }

    // Critical sections are short and never panic while the lock is held;
    // recover the guard rather than propagating a poison error.
    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn id(&self) -> &ActionId {
        &self.id
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn target(&self) -> &FcoRef {
        &self.target
    }

    pub fn entity_type(&self) -> EntityType {
        self.target.entity_type
    }

    pub fn state(&self) -> OperationState {
        self.inner().state
    }

    pub fn reason(&self) -> Option<String> {
        self.inner().reason.clone()
    }

    pub fn is_done(&self) -> bool {
        self.inner().done
    }

    pub fn progress(&self) -> u8 {
        self.progress.load(Ordering::SeqCst)
    }

    /// Advance progress to `to` percent. Monotonically non-decreasing;
    /// attempts to move backwards are ignored.
    pub fn advance_progress(&self, to: u8) {
        self.progress.fetch_max(to.min(100), Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> ActionSnapshot {
        let g = self.inner();
        ActionSnapshot {
            id: self.id.clone(),
            kind: self.kind,
            target: self.target.clone(),
            state: g.state,
            reason: g.reason.clone(),
            progress: self.progress.load(Ordering::SeqCst),
            created_at: self.created_at,
            started_at: g.started_at,
            finished_at: g.finished_at,
            payload: g.payload.clone(),
            done: g.done,
        }
    }

    /* ---------------- lifecycle ---------------- */

    /// `Pending → Running`.
    pub fn start(&self) -> Result<(), ActionStateError> {
        let mut g = self.inner();
        match g.state {
            OperationState::Pending => {
                g.state = OperationState::Running;
                g.started_at = Some(Utc::now());
                Ok(())
            }
            state => Err(self.reject(state, "pending", "start")),
        }
    }

    /// `Running → Success`.
    pub fn success(&self) -> Result<(), ActionStateError> {
        self.success_with_payload(None)
    }

    /// `Running → Success`, attaching the operation payload.
    pub fn success_with(&self, payload: OperationPayload) -> Result<(), ActionStateError> {
        self.success_with_payload(Some(payload))
    }

    fn success_with_payload(
        &self,
        payload: Option<OperationPayload>,
    ) -> Result<(), ActionStateError> {
        let mut g = self.inner();
        match g.state {
            OperationState::Running => {
                g.payload = payload;
                self.finish(&mut g, OperationState::Success, None);
                Ok(())
            }
            state => Err(self.reject(state, "running", "succeed")),
        }
    }

    /// `Running → Failed`.
    pub fn failure(&self, reason: impl Into<String>) -> Result<(), ActionStateError> {
        let mut g = self.inner();
        match g.state {
            OperationState::Running => {
                self.finish(&mut g, OperationState::Failed, Some(reason.into()));
                Ok(())
            }
            state => Err(self.reject(state, "running", "fail")),
        }
    }

    /// `{Pending, Running} → Skipped`. An entity can be skipped before it
    /// ever started.
    pub fn skip(&self, reason: impl Into<String>) -> Result<(), ActionStateError> {
        let mut g = self.inner();
        match g.state {
            OperationState::Pending | OperationState::Running => {
                self.finish(&mut g, OperationState::Skipped, Some(reason.into()));
                Ok(())
            }
            state => Err(self.reject(state, "pending or running", "skip")),
        }
    }

    /// `{Pending, Running} → Aborted`.
    pub fn aborted(&self) -> Result<(), ActionStateError> {
        let mut g = self.inner();
        match g.state {
            OperationState::Pending | OperationState::Running => {
                self.finish(
                    &mut g,
                    OperationState::Aborted,
                    Some(DEFAULT_ABORT_REASON.to_string()),
                );
                Ok(())
            }
            state => Err(self.reject(state, "pending or running", "abort")),
        }
    }

    /// Final bookkeeping step, valid from any state and idempotent.
    ///
    /// A still-Running action is promoted to Success, a never-started one is
    /// skipped; progress is pinned to 100 and the action becomes visible to
    /// statistics. Terminal transitions alone never set the done flag; only
    /// this call does.
    pub fn done(&self) {
        let mut g = self.inner();
        if !g.done {
            match g.state {
                OperationState::Running => {
                    self.finish(&mut g, OperationState::Success, None);
                }
                OperationState::Pending => {
                    self.finish(
                        &mut g,
                        OperationState::Skipped,
                        Some(DEFAULT_SKIP_REASON.to_string()),
                    );
                }
                _ => {}
            }
            g.done = true;
        }
        drop(g);
        self.progress.store(100, Ordering::SeqCst);
    }

    fn finish(&self, g: &mut Inner, state: OperationState, reason: Option<String>) {
        g.state = state;
        if reason.is_some() {
            g.reason = reason;
        }
        g.finished_at = Some(Utc::now());
        self.progress.store(100, Ordering::SeqCst);
    }

    fn reject(
        &self,
        state: OperationState,
        required: &'static str,
        attempted: &'static str,
    ) -> ActionStateError {
        if state.is_terminal() {
            ActionStateError::AlreadyTerminal {
                id: self.id.clone(),
                target: self.target.label(),
                state,
                attempted,
            }
        } else {
            ActionStateError::InvalidTransition {
                id: self.id.clone(),
                target: self.target.label(),
                required,
                attempted,
                state,
            }
        }
    }
}

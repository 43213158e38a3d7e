// src/tasks.rs

//! Asynchronous task surface.
//!
//! The API path submits runnable commands to the dispatcher and hands the
//! caller a [`TaskList`]: the top-level submission outcome plus one
//! [`TaskHandle`] per FCO, polled later through the [`TaskRegistry`].

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::engine::action::{ActionId, ActionSnapshot, ResultAction};
use crate::engine::collection::ResultActionLog;
use crate::engine::state::OperationState;
use crate::engine::stats::{StatisticSummary, StatsError};

/* ---------------- fixed top-level reasons ---------------- */

pub const NO_VALID_FCO_TARGETS: &str = "No valid FCO targets";
pub const REPOSITORY_NOT_ACTIVE: &str = "Repository is not active";
pub const INTERNAL_ERROR: &str = "Internal error, check the server log";

/* ---------------- task handle ---------------- */

/// Pairs one result action with the identifier of the task executing it.
///
/// Exists only on the asynchronous path; the caller polls the registry by
/// action id and the handle is discarded once a terminal state has been
/// retrieved.
#[derive(Debug)]
pub struct TaskHandle {
    pub task_id: Uuid,
    pub action: Arc<ResultAction>,
    join: Option<JoinHandle<()>>,
}

/// Serializable view of a task handle, returned to API callers.
#[derive(Debug, Clone, Serialize)]
pub struct TaskDescriptor {
    pub task_id: Uuid,
    pub action: ActionSnapshot,
}

impl TaskHandle {
    pub fn new(action: Arc<ResultAction>, join: JoinHandle<()>) -> Self {
        Self {
            task_id: Uuid::new_v4(),
            action,
            join: Some(join),
        }
    }

    pub fn descriptor(&self) -> TaskDescriptor {
        TaskDescriptor {
            task_id: self.task_id,
            action: self.action.snapshot(),
        }
    }

    /// Block until the executing task finished, then return the action.
    pub async fn wait(mut self) -> Arc<ResultAction> {
        if let Some(join) = self.join.take() {
            // A panicking command is already recorded as Failed by the
            // adapter; the join error itself carries nothing new.
            let _ = join.await;
        }
        self.action
    }
}

/* ---------------- task list ---------------- */

/// Top-level outcome of one asynchronous submission.
///
/// Owns the result-action collection for the invocation: every dispatched
/// handle's action is appended to the shared log, so statistics can be
/// aggregated once the tasks have finished, same as on the synchronous
/// path.
#[derive(Debug, Default)]
pub struct TaskList {
    state: Option<OperationState>,
    reason: Option<String>,
    tasks: Vec<TaskHandle>,
    log: Arc<ResultActionLog>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskListDescriptor {
    pub state: OperationState,
    pub reason: Option<String>,
    pub tasks: Vec<TaskDescriptor>,
}

impl TaskList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Submission-level failure. Failed and Aborted are sticky and cannot
    /// be overwritten by later submissions.
    pub fn fail(&mut self, reason: impl Into<String>) {
        self.state = Some(OperationState::Failed);
        self.reason = Some(reason.into());
    }

    pub fn abort(&mut self, reason: impl Into<String>) {
        if self.state != Some(OperationState::Failed) {
            self.state = Some(OperationState::Aborted);
            self.reason = Some(reason.into());
        }
        self.log.mark_aborted();
    }

    /// Record a successful submission; ignored once the list is failed or
    /// aborted.
    pub fn mark_submitted(&mut self) {
        match self.state {
            Some(OperationState::Failed) | Some(OperationState::Aborted) => {}
            _ => self.state = Some(OperationState::Success),
        }
    }

    pub fn push(&mut self, handle: TaskHandle) {
        self.log.append(handle.action.clone());
        self.tasks.push(handle);
    }

    /// The result-action collection backing this submission.
    pub fn log(&self) -> Arc<ResultActionLog> {
        self.log.clone()
    }

    pub fn state(&self) -> OperationState {
        self.state.unwrap_or(OperationState::Pending)
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn tasks(&self) -> &[TaskHandle] {
        &self.tasks
    }

    pub fn descriptor(&self) -> TaskListDescriptor {
        TaskListDescriptor {
            state: self.state(),
            reason: self.reason.clone(),
            tasks: self.tasks.iter().map(TaskHandle::descriptor).collect(),
        }
    }

    /// Await every submitted task; used by tests and by callers that want
    /// sync-over-async semantics.
    pub async fn join_all(self) -> Vec<Arc<ResultAction>> {
        let mut finished = Vec::with_capacity(self.tasks.len());
        for handle in self.tasks {
            finished.push(handle.wait().await);
        }
        finished
    }

    /// Await every submitted task, then aggregate the finished collection.
    pub async fn join_stats(self) -> Result<StatisticSummary, StatsError> {
        let log = self.log.clone();
        self.join_all().await;
        StatisticSummary::collect(&log)
    }
}

/* ---------------- registry ---------------- */

/// Polling surface for asynchronous callers.
///
/// An entry is removed once a poll observes the terminal state, so a handle
/// is retrieved exactly once after completion.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    entries: Mutex<HashMap<ActionId, Arc<ResultAction>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<ActionId, Arc<ResultAction>>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn register(&self, action: Arc<ResultAction>) {
        self.entries().insert(action.id().clone(), action);
    }

    /// Snapshot the action; drop the entry when the caller has seen it
    /// reach a terminal state.
    pub fn poll(&self, id: &ActionId) -> Option<ActionSnapshot> {
        let mut entries = self.entries();
        let snapshot = entries.get(id).map(|a| a.snapshot())?;
        if snapshot.done {
            entries.remove(id);
        }
        Some(snapshot)
    }

    /// Drop finished entries nobody polled within `older_than`.
    ///
    /// Pending and running entries are never swept, regardless of age.
    pub fn sweep_done(&self, older_than: chrono::Duration) -> usize {
        let cutoff = chrono::Utc::now() - older_than;
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, action| {
            let snap = action.snapshot();
            !snap.done || snap.finished_at.map(|t| t >= cutoff).unwrap_or(false)
        });
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::OperationKind;
    use crate::fco::{EntityType, FcoRef};

    fn action() -> Arc<ResultAction> {
        Arc::new(ResultAction::new(
            OperationKind::Backup,
            FcoRef {
                uuid: "uuid-1".into(),
                name: "web-01".into(),
                entity_type: EntityType::VirtualMachine,
                tags: vec![],
            },
        ))
    }

    #[test]
    fn failed_list_state_is_sticky() {
        let mut list = TaskList::new();
        list.fail(NO_VALID_FCO_TARGETS);
        list.mark_submitted();
        assert_eq!(list.state(), OperationState::Failed);
        assert_eq!(list.reason(), Some(NO_VALID_FCO_TARGETS));
    }

    #[test]
    fn submission_marks_success() {
        let mut list = TaskList::new();
        assert_eq!(list.state(), OperationState::Pending);
        list.mark_submitted();
        assert_eq!(list.state(), OperationState::Success);
    }

    #[tokio::test]
    async fn push_appends_to_the_collection() {
        let mut list = TaskList::new();
        let ra = action();
        list.push(TaskHandle::new(ra, tokio::spawn(async {})));
        assert_eq!(list.log().len(), 1);

        // Descriptors are the API wire shape, task id included.
        let raw = serde_json::to_string(&list.descriptor()).unwrap();
        assert!(raw.contains("task_id"));
    }

    #[tokio::test]
    async fn join_stats_aggregates_finished_tasks() {
        let mut list = TaskList::new();
        for _ in 0..3 {
            let ra = action();
            let worker = ra.clone();
            let join = tokio::spawn(async move {
                worker.start().unwrap();
                worker.success().unwrap();
                worker.done();
            });
            list.push(TaskHandle::new(ra, join));
            list.mark_submitted();
        }

        let stats = list.join_stats().await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.overall.success, 3);
    }

    #[test]
    fn registry_retires_done_entries_on_poll() {
        let registry = TaskRegistry::new();
        let ra = action();
        registry.register(ra.clone());

        // Still pending: stays registered.
        assert!(registry.poll(ra.id()).is_some());
        assert_eq!(registry.len(), 1);

        ra.start().unwrap();
        ra.success().unwrap();
        ra.done();

        let snap = registry.poll(ra.id()).expect("terminal snapshot");
        assert!(snap.done);
        assert!(registry.is_empty());
        assert!(registry.poll(ra.id()).is_none());
    }

    #[test]
    fn sweep_drops_only_stale_finished_entries() {
        let registry = TaskRegistry::new();

        let pending = action();
        registry.register(pending.clone());

        let finished = action();
        finished.start().unwrap();
        finished.success().unwrap();
        finished.done();
        registry.register(finished);

        // Zero retention: anything finished is already stale.
        assert_eq!(registry.sweep_done(chrono::Duration::zero()), 1);
        assert_eq!(registry.len(), 1);
        assert!(registry.poll(pending.id()).is_some());

        // A generous retention keeps fresh finished entries around.
        pending.start().unwrap();
        pending.success().unwrap();
        pending.done();
        assert_eq!(registry.sweep_done(chrono::Duration::minutes(10)), 0);
        assert_eq!(registry.len(), 1);
    }
}

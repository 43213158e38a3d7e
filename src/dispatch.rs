// src/dispatch.rs

//! Task dispatcher and the runnable-command adapter.
//!
//! [`ThreadsManager`] keeps one bounded worker pool per operation category;
//! submission is fire-and-forget and FIFO per category (tokio's semaphore
//! hands out permits in request order). All terminal-state bookkeeping is
//! owned by [`RunnableCommand`], which guarantees that a result action
//! reaches a terminal state and is marked done no matter how the delegated
//! operation exits — including panics, which must never take down a sibling
//! or the pool.

use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::engine::action::ResultAction;
use crate::engine::events::DiagnosticEvent;
use crate::engine::sink::DiagnosticSink;
use crate::engine::OpCategory;
use crate::ops::{OpContext, OperationRunner, Outcome};
use crate::tasks::TaskHandle;

/// Worker counts per category, from the `pools` config section.
#[derive(Debug, Clone, Copy)]
pub struct PoolSizes {
    pub fco: usize,
    pub archive: usize,
    pub generation: usize,
}

impl Default for PoolSizes {
    fn default() -> Self {
        Self {
            fco: 4,
            archive: 2,
            generation: 2,
        }
    }
}

/// Registry of bounded worker pools keyed by operation category.
#[derive(Debug)]
pub struct ThreadsManager {
    fco: Arc<Semaphore>,
    archive: Arc<Semaphore>,
    generation: Arc<Semaphore>,
}

impl ThreadsManager {
    pub fn new(sizes: PoolSizes) -> Self {
        Self {
            fco: Arc::new(Semaphore::new(sizes.fco.max(1))),
            archive: Arc::new(Semaphore::new(sizes.archive.max(1))),
            generation: Arc::new(Semaphore::new(sizes.generation.max(1))),
        }
    }

    fn pool(&self, category: OpCategory) -> Arc<Semaphore> {
        match category {
            OpCategory::Fco => self.fco.clone(),
            OpCategory::Archive => self.archive.clone(),
            OpCategory::Generation => self.generation.clone(),
        }
    }

    /// Submit a command to the pool for its category.
    ///
    /// Fire-and-forget: the returned handle is for polling/joining only, no
    /// retry and no reordering happen here.
    pub fn submit(&self, cmd: RunnableCommand) -> TaskHandle {
        let action = cmd.action();
        let pool = self.pool(cmd.category());
        let join = tokio::spawn(async move {
            match pool.acquire_owned().await {
                Ok(_permit) => cmd.execute().await,
                // Only possible if the pool were closed; never submit work
                // that silently disappears.
                Err(_) => cmd.cancel("worker pool closed"),
            }
        });
        TaskHandle::new(action, join)
    }
}

/// Binds one result action to the delegated operation logic.
pub struct RunnableCommand {
    action: Arc<ResultAction>,
    runner: Arc<dyn OperationRunner>,
    ctx: OpContext,
    sink: Arc<dyn DiagnosticSink>,
}

impl RunnableCommand {
    pub fn new(
        action: Arc<ResultAction>,
        runner: Arc<dyn OperationRunner>,
        ctx: OpContext,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Self {
        Self {
            action,
            runner,
            ctx,
            sink,
        }
    }

    pub fn action(&self) -> Arc<ResultAction> {
        self.action.clone()
    }

    pub fn category(&self) -> OpCategory {
        self.action.kind().category()
    }

    /// Run the delegated operation and record its outcome.
    ///
    /// The action is guaranteed to reach a terminal state before `done()`
    /// becomes observable, and `done()` runs exactly once on every exit
    /// path.
    pub async fn execute(self) {
        let RunnableCommand {
            action,
            runner,
            ctx,
            sink,
        } = self;

        // Abort observed before this unit started: record it, make no call.
        if ctx.abort.is_triggered() {
            if let Err(e) = action.aborted() {
                sink.emit(DiagnosticEvent::warning(e.to_string()).for_action(action.id().clone()));
            }
            action.done();
            return;
        }

        if let Err(e) = action.start() {
            sink.emit(DiagnosticEvent::warning(e.to_string()).for_action(action.id().clone()));
            action.done();
            return;
        }

        let target = action.target().clone();
        let blocking_ctx = ctx.clone();
        let joined =
            tokio::task::spawn_blocking(move || runner.perform(&target, &blocking_ctx)).await;

        let transition = match joined {
            Ok(Ok(Outcome::Success(Some(payload)))) => action.success_with(payload),
            Ok(Ok(Outcome::Success(None))) => action.success(),
            Ok(Ok(Outcome::Failed(reason))) => {
                sink.emit(
                    DiagnosticEvent::warning(format!(
                        "{} failed for {}: {reason}",
                        action.kind(),
                        action.target().label()
                    ))
                    .for_action(action.id().clone()),
                );
                action.failure(reason)
            }
            Ok(Ok(Outcome::Skipped(reason))) => action.skip(reason),
            Ok(Ok(Outcome::Aborted)) => action.aborted(),
            Ok(Err(err)) => {
                let reason = format!("{err:#}");
                sink.emit(
                    DiagnosticEvent::error(
                        format!(
                            "{} raised an error for {}",
                            action.kind(),
                            action.target().label()
                        ),
                        Some(reason.clone()),
                    )
                    .for_action(action.id().clone()),
                );
                action.failure(reason)
            }
            Err(join_err) => {
                let reason = if join_err.is_panic() {
                    "operation panicked".to_string()
                } else {
                    "operation was cancelled by the runtime".to_string()
                };
                sink.emit(
                    DiagnosticEvent::error(
                        format!(
                            "{} did not return for {}",
                            action.kind(),
                            action.target().label()
                        ),
                        Some(join_err.to_string()),
                    )
                    .for_action(action.id().clone()),
                );
                action.failure(reason)
            }
        };

        // A rejected transition is a programming error in the runner
        // contract; surface it without disturbing siblings.
        if let Err(e) = transition {
            sink.emit(DiagnosticEvent::warning(e.to_string()).for_action(action.id().clone()));
        }

        action.done();
    }

    /// Retire a command that will never run.
    pub fn cancel(self, reason: &str) {
        if let Err(e) = self.action.skip(reason) {
            self.sink
                .emit(DiagnosticEvent::warning(e.to_string()).for_action(self.action.id().clone()));
        }
        self.action.done();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abort::AbortSignal;
    use crate::engine::{OperationKind, OperationState};
    use crate::fco::{EntityType, FcoRef};
    use crate::ops::OperationOptions;
    use crate::sinks::collecting::CollectingSink;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Scripted<F>(F);

    impl<F> OperationRunner for Scripted<F>
    where
        F: Fn(&FcoRef) -> anyhow::Result<Outcome> + Send + Sync,
    {
        fn perform(&self, target: &FcoRef, _ctx: &OpContext) -> anyhow::Result<Outcome> {
            (self.0)(target)
        }
    }

    fn fco(name: &str) -> FcoRef {
        FcoRef {
            uuid: format!("uuid-{name}"),
            name: name.into(),
            entity_type: EntityType::VirtualMachine,
            tags: vec![],
        }
    }

    fn ctx(abort: AbortSignal) -> OpContext {
        OpContext {
            kind: OperationKind::Backup,
            options: OperationOptions::default(),
            abort,
        }
    }

    fn command(
        runner: impl OperationRunner + 'static,
        abort: AbortSignal,
        sink: Arc<CollectingSink>,
    ) -> (Arc<ResultAction>, RunnableCommand) {
        let action = Arc::new(ResultAction::new(OperationKind::Backup, fco("a")));
        let cmd = RunnableCommand::new(action.clone(), Arc::new(runner), ctx(abort), sink);
        (action, cmd)
    }

    #[tokio::test]
    async fn panic_is_contained_and_recorded_as_failed() {
        let sink = Arc::new(CollectingSink::new());
        let (action, cmd) = command(
            Scripted(|_t: &FcoRef| -> anyhow::Result<Outcome> { panic!("boom") }),
            AbortSignal::new(),
            sink.clone(),
        );

        cmd.execute().await;

        assert_eq!(action.state(), OperationState::Failed);
        assert!(action.is_done());
        assert_eq!(action.reason().as_deref(), Some("operation panicked"));
        assert!(!sink.is_empty());
    }

    #[tokio::test]
    async fn runner_error_becomes_failed_with_reason() {
        let sink = Arc::new(CollectingSink::new());
        let (action, cmd) = command(
            Scripted(|_t: &FcoRef| Err(anyhow::anyhow!("vddk handle lost"))),
            AbortSignal::new(),
            sink.clone(),
        );

        cmd.execute().await;

        assert_eq!(action.state(), OperationState::Failed);
        assert!(action.reason().unwrap().contains("vddk handle lost"));
        let events = sink.events();
        assert!(events
            .iter()
            .any(|e| e.cause.as_deref() == Some("vddk handle lost")));
    }

    #[tokio::test]
    async fn abort_seen_before_start_marks_aborted_without_calling_runner() {
        let sink = Arc::new(CollectingSink::new());
        let abort = AbortSignal::new();
        abort.trigger();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in = calls.clone();
        let (action, cmd) = command(
            Scripted(move |_t: &FcoRef| {
                calls_in.fetch_add(1, Ordering::SeqCst);
                Ok(Outcome::Success(None))
            }),
            abort,
            sink,
        );

        cmd.execute().await;

        assert_eq!(action.state(), OperationState::Aborted);
        assert!(action.is_done());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn pool_bounds_concurrency_per_category() {
        let threads = ThreadsManager::new(PoolSizes {
            fco: 2,
            archive: 1,
            generation: 1,
        });
        let sink = Arc::new(CollectingSink::new());
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for i in 0..6 {
            let running = running.clone();
            let peak = peak.clone();
            let action = Arc::new(ResultAction::new(OperationKind::Backup, fco(&i.to_string())));
            let cmd = RunnableCommand::new(
                action,
                Arc::new(Scripted(move |_t: &FcoRef| {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(30));
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok(Outcome::Success(None))
                })),
                ctx(AbortSignal::new()),
                sink.clone(),
            );
            handles.push(threads.submit(cmd));
        }

        for handle in handles {
            let action = handle.wait().await;
            assert_eq!(action.state(), OperationState::Success);
            assert!(action.is_done());
        }
        assert!(peak.load(Ordering::SeqCst) <= 2, "fco pool must cap at 2");
    }
}

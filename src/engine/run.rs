use std::sync::Arc;

use crate::abort::AbortSignal;
use crate::dispatch::{RunnableCommand, ThreadsManager};
use crate::engine::action::{ResultAction, DEFAULT_ABORT_REASON};
use crate::engine::collection::ResultActionLog;
use crate::engine::events::DiagnosticEvent;
use crate::engine::sink::DiagnosticSink;
use crate::engine::state::OperationState;
use crate::engine::stats::StatisticSummary;
use crate::engine::OperationKind;
use crate::fco::{FcoResolver, TargetFilter};
use crate::ops::{OpContext, OperationOptions, OperationRunner, RepositoryTarget};
use crate::tasks::{TaskList, TaskRegistry, INTERNAL_ERROR, NO_VALID_FCO_TARGETS, REPOSITORY_NOT_ACTIVE};

/// Everything one command invocation needs to fan out.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub kind: OperationKind,
    pub filter: TargetFilter,
    pub options: OperationOptions,
    pub abort: AbortSignal,
}

/// Collaborators shared by every unit of one invocation.
#[derive(Clone)]
pub struct Collaborators {
    pub resolver: Arc<dyn FcoResolver>,
    pub runner: Arc<dyn OperationRunner>,
    pub repository: Arc<dyn RepositoryTarget>,
    pub sink: Arc<dyn DiagnosticSink>,
}

/// Final result of a synchronous command invocation.
#[derive(Debug)]
pub struct CommandReport {
    pub kind: OperationKind,
    pub state: OperationState,
    pub reason: Option<String>,
    pub log: ResultActionLog,
    pub stats: Option<StatisticSummary>,
}

impl CommandReport {
    fn failed(kind: OperationKind, reason: impl Into<String>, log: ResultActionLog) -> Self {
        let reason = reason.into();
        log.record_reason(reason.clone());
        Self {
            kind,
            state: OperationState::Failed,
            reason: Some(reason),
            log,
            stats: None,
        }
    }

    /// True when nothing in the invocation warrants a non-zero exit code.
    pub fn is_clean(&self) -> bool {
        let stats_clean = self
            .stats
            .as_ref()
            .map(|s| s.overall.all_clean())
            .unwrap_or(false);
        self.state.is_clean() && stats_clean
    }
}

/// Synchronous fan-out: one FCO fully completes before the next starts.
///
/// The loop shape is shared by every operation kind: repository gate,
/// target resolution, then per-FCO execution with the cooperative abort
/// polled before each new unit. In-flight work is never force-killed.
pub async fn run_sync(ctx: CommandContext, deps: &Collaborators) -> CommandReport {
    let log = ResultActionLog::new();

    if !deps.repository.is_enabled() {
        return CommandReport::failed(ctx.kind, REPOSITORY_NOT_ACTIVE, log);
    }
    if let Err(err) = deps.repository.open() {
        deps.sink.emit(DiagnosticEvent::error(
            format!("repository {} cannot be opened", deps.repository.name()),
            Some(format!("{err:#}")),
        ));
        return CommandReport::failed(ctx.kind, format!("{err:#}"), log);
    }

    let targets = deps.resolver.resolve(&ctx.filter);
    if targets.is_empty() {
        // "Ran and found nothing" must stay distinguishable from an empty
        // success.
        return CommandReport::failed(ctx.kind, NO_VALID_FCO_TARGETS, log);
    }

    for fco in targets {
        if ctx.abort.is_triggered() {
            log.mark_aborted();
            break;
        }

        let action = Arc::new(ResultAction::new(ctx.kind, fco));
        log.append(action.clone());

        let cmd = RunnableCommand::new(
            action.clone(),
            deps.runner.clone(),
            op_context(&ctx),
            deps.sink.clone(),
        );
        cmd.execute().await;

        match action.state() {
            OperationState::Aborted => {
                log.mark_aborted();
                break;
            }
            OperationState::Failed | OperationState::Skipped => {
                if let Some(reason) = action.reason() {
                    log.record_reason(reason);
                }
            }
            _ => {}
        }
    }

    finalize(ctx.kind, log, deps)
}

/// Asynchronous fan-out: submit every unit to the category pool and return
/// task handles immediately. Completion order is unconstrained.
pub fn submit_async(
    ctx: CommandContext,
    deps: &Collaborators,
    threads: &ThreadsManager,
    registry: &TaskRegistry,
) -> TaskList {
    let mut tasks = TaskList::new();

    if !deps.repository.is_enabled() {
        tasks.fail(REPOSITORY_NOT_ACTIVE);
        return tasks;
    }
    if let Err(err) = deps.repository.open() {
        deps.sink.emit(DiagnosticEvent::error(
            format!("repository {} cannot be opened", deps.repository.name()),
            Some(format!("{err:#}")),
        ));
        tasks.fail(format!("{err:#}"));
        return tasks;
    }

    let targets = deps.resolver.resolve(&ctx.filter);
    if targets.is_empty() {
        tasks.fail(NO_VALID_FCO_TARGETS);
        return tasks;
    }

    for fco in targets {
        if ctx.abort.is_triggered() {
            tasks.abort(DEFAULT_ABORT_REASON);
            break;
        }

        let action = Arc::new(ResultAction::new(ctx.kind, fco));
        let cmd = RunnableCommand::new(
            action.clone(),
            deps.runner.clone(),
            op_context(&ctx),
            deps.sink.clone(),
        );
        registry.register(action);
        tasks.push(threads.submit(cmd));
        tasks.mark_submitted();
    }

    tasks
}

fn op_context(ctx: &CommandContext) -> OpContext {
    OpContext {
        kind: ctx.kind,
        options: ctx.options.clone(),
        abort: ctx.abort.clone(),
    }
}

fn finalize(kind: OperationKind, log: ResultActionLog, deps: &Collaborators) -> CommandReport {
    // Sequential execution guarantees every appended action is done.
    let stats = match StatisticSummary::collect(&log) {
        Ok(stats) => stats,
        Err(err) => {
            deps.sink.emit(DiagnosticEvent::error(
                "statistics over an unfinished collection".to_string(),
                Some(err.to_string()),
            ));
            return CommandReport::failed(kind, INTERNAL_ERROR, log);
        }
    };

    let state = if stats.overall.aborted > 0 || log.quit_requested() {
        OperationState::Aborted
    } else if stats.overall.failed > 0 {
        OperationState::Failed
    } else {
        OperationState::Success
    };

    CommandReport {
        kind,
        state,
        reason: log.last_reason(),
        log,
        stats: Some(stats),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::PoolSizes;
    use crate::fco::{EntityType, FcoRef, InventoryResolver};
    use crate::ops::Outcome;
    use crate::sinks::collecting::CollectingSink;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Scripted<F>(F);

    impl<F> OperationRunner for Scripted<F>
    where
        F: Fn(&FcoRef, &OpContext) -> anyhow::Result<Outcome> + Send + Sync,
    {
        fn perform(&self, target: &FcoRef, ctx: &OpContext) -> anyhow::Result<Outcome> {
            (self.0)(target, ctx)
        }
    }

    struct Repo {
        enabled: bool,
    }

    impl RepositoryTarget for Repo {
        fn name(&self) -> &str {
            "test-repo"
        }
        fn is_enabled(&self) -> bool {
            self.enabled
        }
        fn open(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn vm(name: &str) -> FcoRef {
        FcoRef {
            uuid: format!("uuid-{name}"),
            name: name.into(),
            entity_type: EntityType::VirtualMachine,
            tags: vec!["all".into()],
        }
    }

    fn deps(
        inventory: Vec<FcoRef>,
        enabled: bool,
        runner: impl OperationRunner + 'static,
    ) -> Collaborators {
        Collaborators {
            resolver: Arc::new(InventoryResolver::new(inventory)),
            runner: Arc::new(runner),
            repository: Arc::new(Repo { enabled }),
            sink: Arc::new(CollectingSink::new()),
        }
    }

    fn ctx(kind: OperationKind, abort: AbortSignal) -> CommandContext {
        CommandContext {
            kind,
            filter: TargetFilter {
                all: true,
                ..Default::default()
            },
            options: OperationOptions::default(),
            abort,
        }
    }

    #[tokio::test]
    async fn empty_resolution_is_failed_never_success() {
        let deps = deps(vec![], true, Scripted(|_t: &FcoRef, _c: &OpContext| Ok(Outcome::Success(None))));
        let report = run_sync(ctx(OperationKind::Backup, AbortSignal::new()), &deps).await;

        assert_eq!(report.state, OperationState::Failed);
        assert_eq!(report.reason.as_deref(), Some(NO_VALID_FCO_TARGETS));
        assert!(report.log.is_empty());
        assert!(report.stats.is_none());
    }

    #[tokio::test]
    async fn disabled_repository_short_circuits_before_any_action() {
        let deps = deps(
            vec![vm("a")],
            false,
            Scripted(|_t: &FcoRef, _c: &OpContext| Ok(Outcome::Success(None))),
        );
        let report = run_sync(ctx(OperationKind::Backup, AbortSignal::new()), &deps).await;

        assert_eq!(report.state, OperationState::Failed);
        assert_eq!(report.reason.as_deref(), Some(REPOSITORY_NOT_ACTIVE));
        assert!(report.log.is_empty());
    }

    #[tokio::test]
    async fn sibling_failure_stays_isolated() {
        let inventory: Vec<_> = (1..=5).map(|i| vm(&format!("vm-{i}"))).collect();
        let deps = deps(
            inventory,
            true,
            Scripted(|t: &FcoRef, _c: &OpContext| {
                if t.name == "vm-3" {
                    Err(anyhow::anyhow!("snapshot creation failed"))
                } else {
                    Ok(Outcome::Success(None))
                }
            }),
        );
        let report = run_sync(ctx(OperationKind::Backup, AbortSignal::new()), &deps).await;

        let stats = report.stats.expect("complete stats");
        assert_eq!(stats.total, 5);
        assert_eq!(stats.overall.success, 4);
        assert_eq!(stats.overall.failed, 1);
        assert_eq!(stats.overall.skipped, 0);
        assert_eq!(stats.overall.aborted, 0);

        let snaps = report.log.snapshots();
        assert_eq!(snaps[2].state, OperationState::Failed);
        assert!(snaps[2]
            .reason
            .as_deref()
            .unwrap()
            .contains("snapshot creation failed"));
        assert_eq!(report.state, OperationState::Failed);
    }

    #[tokio::test]
    async fn abort_stops_new_units_and_keeps_completed_outcomes() {
        let inventory: Vec<_> = (1..=4).map(|i| vm(&format!("vm-{i}"))).collect();
        let deps = deps(
            inventory,
            true,
            Scripted(|t: &FcoRef, c: &OpContext| {
                if t.name == "vm-2" {
                    // Simulates the user interrupt arriving mid-operation.
                    c.abort.trigger();
                    Ok(Outcome::Aborted)
                } else {
                    Ok(Outcome::Success(None))
                }
            }),
        );
        let report = run_sync(ctx(OperationKind::Backup, AbortSignal::new()), &deps).await;

        // vm-1 completed, vm-2 aborted, vm-3/vm-4 never appended.
        assert_eq!(report.log.len(), 2);
        let snaps = report.log.snapshots();
        assert_eq!(snaps[0].state, OperationState::Success);
        assert_eq!(snaps[1].state, OperationState::Aborted);
        assert_eq!(report.state, OperationState::Aborted);
        assert!(report.log.quit_requested());

        let stats = report.stats.expect("aborted collections are complete");
        assert_eq!(stats.overall.success, 1);
        assert_eq!(stats.overall.aborted, 1);
    }

    #[tokio::test]
    async fn rolled_up_reason_is_the_most_recent_failure() {
        let deps = deps(
            vec![vm("a"), vm("b")],
            true,
            Scripted(|t: &FcoRef, _c: &OpContext| Ok(Outcome::Failed(format!("{} broke", t.name)))),
        );
        let report = run_sync(ctx(OperationKind::Backup, AbortSignal::new()), &deps).await;
        assert_eq!(report.reason.as_deref(), Some("b broke"));
    }

    #[tokio::test]
    async fn async_submission_records_all_outcomes() {
        let inventory: Vec<_> = (1..=5).map(|i| vm(&format!("vm-{i}"))).collect();
        let deps = deps(
            inventory,
            true,
            Scripted(|t: &FcoRef, _c: &OpContext| {
                if t.name == "vm-3" {
                    Ok(Outcome::Failed("bad generation".into()))
                } else {
                    Ok(Outcome::Success(None))
                }
            }),
        );
        let threads = ThreadsManager::new(PoolSizes::default());
        let registry = TaskRegistry::new();

        let tasks = submit_async(
            ctx(OperationKind::Backup, AbortSignal::new()),
            &deps,
            &threads,
            &registry,
        );
        assert_eq!(tasks.state(), OperationState::Success);
        assert_eq!(tasks.tasks().len(), 5);
        assert_eq!(tasks.log().len(), 5);
        assert_eq!(registry.len(), 5);

        let log = tasks.log();
        let stats = tasks.join_stats().await.expect("all tasks joined");
        assert_eq!(stats.total, 5);
        assert_eq!(stats.overall.success, 4);
        assert_eq!(stats.overall.failed, 1);
        assert!(log.all_done());
    }

    #[tokio::test]
    async fn async_empty_resolution_fails_without_submitting() {
        let deps = deps(vec![], true, Scripted(|_t: &FcoRef, _c: &OpContext| Ok(Outcome::Success(None))));
        let threads = ThreadsManager::new(PoolSizes::default());
        let registry = TaskRegistry::new();

        let tasks = submit_async(
            ctx(OperationKind::Backup, AbortSignal::new()),
            &deps,
            &threads,
            &registry,
        );
        assert_eq!(tasks.state(), OperationState::Failed);
        assert_eq!(tasks.reason(), Some(NO_VALID_FCO_TARGETS));
        assert!(tasks.tasks().is_empty());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn abort_during_async_submission_stops_new_dispatch() {
        let inventory: Vec<_> = (1..=4).map(|i| vm(&format!("vm-{i}"))).collect();
        let submitted = Arc::new(AtomicUsize::new(0));
        let submitted_in = submitted.clone();
        let deps = deps(
            inventory,
            true,
            Scripted(move |_t: &FcoRef, _c: &OpContext| {
                submitted_in.fetch_add(1, Ordering::SeqCst);
                Ok(Outcome::Success(None))
            }),
        );
        let threads = ThreadsManager::new(PoolSizes::default());
        let registry = TaskRegistry::new();
        let abort = AbortSignal::new();
        abort.trigger();

        let tasks = submit_async(
            ctx(OperationKind::Backup, abort),
            &deps,
            &threads,
            &registry,
        );
        assert_eq!(tasks.state(), OperationState::Aborted);
        assert!(tasks.tasks().is_empty());
        assert_eq!(submitted.load(Ordering::SeqCst), 0);
    }
}

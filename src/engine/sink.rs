use crate::engine::events::DiagnosticEvent;

/// Write-only diagnostic channel.
///
/// Shared by every worker of a command invocation, hence `&self` and
/// `Send + Sync`. The orchestration layer only ever writes; a sink failure
/// must never influence an orchestration outcome, so `emit` is infallible.
pub trait DiagnosticSink: Send + Sync {
    fn emit(&self, event: DiagnosticEvent);
}

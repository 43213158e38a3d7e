use crate::engine::events::{DiagnosticEvent, Severity};
use crate::engine::sink::DiagnosticSink;

/// Default sink: forwards diagnostic events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&self, event: DiagnosticEvent) {
        let action = event
            .action_id
            .as_ref()
            .map(|id| id.0.as_str())
            .unwrap_or("-");
        match event.severity {
            Severity::Info => {
                tracing::info!(action, "{}", event.message);
            }
            Severity::Warning => {
                tracing::warn!(action, cause = event.cause.as_deref(), "{}", event.message);
            }
            Severity::Error => {
                tracing::error!(action, cause = event.cause.as_deref(), "{}", event.message);
            }
        }
    }
}

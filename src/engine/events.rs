use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::engine::action::ActionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// One entry on the diagnostic side channel.
///
/// Emitted whenever the orchestration layer catches a failure; `cause`
/// carries the rendered source error so nothing is swallowed on the way to
/// the per-action reason string.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticEvent {
    pub severity: Severity,
    pub message: String,
    pub cause: Option<String>,
    pub action_id: Option<ActionId>,
    pub timestamp: DateTime<Utc>,
}

impl DiagnosticEvent {
    pub fn info(message: impl Into<String>) -> Self {
        Self::build(Severity::Info, message, None)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::build(Severity::Warning, message, None)
    }

    pub fn error(message: impl Into<String>, cause: Option<String>) -> Self {
        Self::build(Severity::Error, message, cause)
    }

    pub fn for_action(mut self, id: ActionId) -> Self {
        self.action_id = Some(id);
        self
    }

    fn build(severity: Severity, message: impl Into<String>, cause: Option<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            cause,
            action_id: None,
            timestamp: Utc::now(),
        }
    }
}

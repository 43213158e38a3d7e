use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of one unit of work.
///
/// `Pending → Running → {Success, Failed, Skipped, Aborted}`; terminal
/// states are final and never re-entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationState {
    Pending,
    Running,
    Success,
    Failed,
    Skipped,
    Aborted,
}

impl OperationState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OperationState::Success
                | OperationState::Failed
                | OperationState::Skipped
                | OperationState::Aborted
        )
    }

    /// Success and Skipped are the outcomes that do not affect the process
    /// exit code.
    pub fn is_clean(&self) -> bool {
        matches!(self, OperationState::Success | OperationState::Skipped)
    }
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationState::Pending => "pending",
            OperationState::Running => "running",
            OperationState::Success => "success",
            OperationState::Failed => "failed",
            OperationState::Skipped => "skipped",
            OperationState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

//! Lifecycle of one fetch operation.

use std::fmt;

/// `Created -> Queued -> Running -> {Completed | Cancelled | Failed}`.
///
/// An operation cancelled before it got a slot goes straight from `Queued`
/// to `Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationState {
    Created,
    Queued,
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl OperationState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OperationState::Completed | OperationState::Cancelled | OperationState::Failed
        )
    }
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperationState::Created => "created",
            OperationState::Queued => "queued",
            OperationState::Running => "running",
            OperationState::Completed => "completed",
            OperationState::Cancelled => "cancelled",
            OperationState::Failed => "failed",
        };
        f.write_str(s)
    }
}

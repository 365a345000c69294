//! Derived saga lifecycle state.

use serde::{Deserialize, Serialize};

/// The state of a saga, derived from its event log.
///
/// State transitions:
/// ```text
/// Running ──┬──────────────────► Succeeded
///           └──► Compensating ──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SagaState {
    /// Saga steps are being executed (or are resumable).
    Running,

    /// A compensation sub-flow is in progress.
    Compensating,

    /// The saga completed successfully (terminal state).
    Succeeded,

    /// The saga completed unsuccessfully (terminal state).
    Failed,
}

impl SagaState {
    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SagaState::Succeeded | SagaState::Failed)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaState::Running => "Running",
            SagaState::Compensating => "Compensating",
            SagaState::Succeeded => "Succeeded",
            SagaState::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for SagaState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

//! Saga events.
//!
//! Every fact recorded on a saga's log is one variant of [`SagaEvent`].
//! The union is closed: the engine's resumption logic depends on being
//! able to fold any log it finds, so arbitrary event kinds are not
//! admitted. Command payloads vary per flow and travel inside the
//! `Command` variant.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::command::CommandData;

/// Events that can occur during saga execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SagaEvent {
    /// A command was added: work still to be done by some action.
    Command(CommandData),

    /// The work associated with a command type has been finished.
    /// Matched by the command's type tag, not by instance.
    CommandCompleted(CommandCompletedData),

    /// An action raised an error. Recorded for audit, then re-raised.
    ActionErrorOccurred(ActionErrorData),

    /// Terminal marker. A saga completes exactly once.
    Completed(CompletedData),

    /// A compensation sub-flow started.
    RollbackStarted,

    /// A compensation sub-flow finished.
    RollbackCompleted,

    /// Free-form operator/end-user diagnostic message.
    LogAppended(LogData),
}

impl SagaEvent {
    /// Returns the discriminant used for log storage. Command entries
    /// report their own command type tag.
    pub fn event_type(&self) -> &str {
        match self {
            SagaEvent::Command(data) => data.tag(),
            SagaEvent::CommandCompleted(_) => "SagaCommandCompleted",
            SagaEvent::ActionErrorOccurred(_) => "SagaActionErrorOccurred",
            SagaEvent::Completed(_) => "SagaCompleted",
            SagaEvent::RollbackStarted => "SagaRollbackStarted",
            SagaEvent::RollbackCompleted => "SagaRollbackCompleted",
            SagaEvent::LogAppended(_) => "SagaLogAppended",
        }
    }
}

/// Data for CommandCompleted events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandCompletedData {
    /// The completed command's type tag.
    pub command: String,
}

/// Data for ActionErrorOccurred events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionErrorData {
    /// The action that raised.
    pub action_name: String,
    /// Error message describing the failure.
    pub error: String,
    /// Whether the caller may retry the saga.
    pub retryable: bool,
}

/// Data for Completed events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedData {
    /// Whether the saga finished successfully.
    pub success: bool,
    /// When the saga completed.
    pub completed_at: DateTime<Utc>,
}

/// Data for LogAppended events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogData {
    /// Human-readable message.
    pub message: String,
    /// Associated error, if any.
    pub error: Option<String>,
    /// Arbitrary key/value diagnostics.
    pub diagnostics: HashMap<String, serde_json::Value>,
}

// Convenience constructors
impl SagaEvent {
    /// Creates a Command event from an already-encoded command.
    pub fn command(data: CommandData) -> Self {
        SagaEvent::Command(data)
    }

    /// Creates a Command event from a typed command.
    pub fn command_of<C: crate::command::SagaCommand>(
        command: &C,
    ) -> Result<Self, serde_json::Error> {
        Ok(SagaEvent::Command(CommandData::encode(command)?))
    }

    /// Creates a CommandCompleted event for a command type tag.
    pub fn command_completed(command: impl Into<String>) -> Self {
        SagaEvent::CommandCompleted(CommandCompletedData {
            command: command.into(),
        })
    }

    /// Creates an ActionErrorOccurred event.
    pub fn action_error(
        action_name: impl Into<String>,
        error: impl Into<String>,
        retryable: bool,
    ) -> Self {
        SagaEvent::ActionErrorOccurred(ActionErrorData {
            action_name: action_name.into(),
            error: error.into(),
            retryable,
        })
    }

    /// Creates a Completed event.
    pub fn completed(success: bool) -> Self {
        SagaEvent::Completed(CompletedData {
            success,
            completed_at: Utc::now(),
        })
    }

    /// Creates a LogAppended event.
    pub fn log(message: impl Into<String>) -> Self {
        SagaEvent::LogAppended(LogData {
            message: message.into(),
            error: None,
            diagnostics: HashMap::new(),
        })
    }

    /// Creates a LogAppended event carrying an error.
    pub fn log_error(message: impl Into<String>, error: impl Into<String>) -> Self {
        SagaEvent::LogAppended(LogData {
            message: message.into(),
            error: Some(error.into()),
            diagnostics: HashMap::new(),
        })
    }

    /// Creates a LogAppended event with key/value diagnostics.
    pub fn log_with(
        message: impl Into<String>,
        diagnostics: HashMap<String, serde_json::Value>,
    ) -> Self {
        SagaEvent::LogAppended(LogData {
            message: message.into(),
            error: None,
            diagnostics,
        })
    }
}

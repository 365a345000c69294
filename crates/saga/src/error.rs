//! Saga error types.

use common::SagaId;
use event_store::{EventStoreError, Sequence};
use thiserror::Error;

/// An error raised inside a saga action's `apply`.
///
/// Actions signal whether the failure is worth retrying; when the
/// underlying cause gives no signal, retryability defaults to `false`.
/// Every action error is durably recorded on the saga's log before it is
/// returned to the caller.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ActionError {
    message: String,
    retryable: bool,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ActionError {
    /// Creates an error the caller may retry (e.g. a transient remote
    /// failure).
    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
            source: None,
        }
    }

    /// Creates an error that retrying will not fix.
    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
            source: None,
        }
    }

    /// Attaches the underlying cause.
    pub fn with_source(
        mut self,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Overrides the retryability signal, e.g. after translation by an
    /// exception handler.
    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    /// Returns true if the caller may retry the saga after this error.
    pub fn is_retryable(&self) -> bool {
        self.retryable
    }
}

impl From<serde_json::Error> for ActionError {
    fn from(e: serde_json::Error) -> Self {
        Self::permanent(format!("Command serialization failed: {e}")).with_source(e)
    }
}

/// Errors that can occur during saga orchestration.
#[derive(Debug, Error)]
pub enum SagaError {
    /// The saga could not be found when it was required to exist.
    #[error("Saga not found: {0}")]
    SagaNotFound(SagaId),

    /// A flow declared a step whose input command was never produced.
    #[error("Saga {saga} has no pending '{command}' command required by action '{action}'")]
    MissingCommand {
        saga: SagaId,
        command: String,
        action: String,
    },

    /// An action returned no next command while the flow still has
    /// unfinished steps.
    #[error("Action '{action}' did not return a next command, but the flow has more steps")]
    MissingNextCommand { action: String },

    /// No action or handler is registered under the given identifier.
    #[error("No action or handler registered under '{0}'")]
    UnknownHandler(String),

    /// A completion handler produced a result of an unexpected type.
    #[error("Completion handler '{handler}' returned an unexpected result type")]
    CompletionHandlerResult { handler: String },

    /// The saga's sequence counter only moves forward.
    #[error("Saga sequence cannot move backwards: {current} -> {requested}")]
    SequenceRollback {
        current: Sequence,
        requested: Sequence,
    },

    /// An action failed; the error has been recorded on the saga's log.
    #[error("Action '{action}' failed: {source}")]
    ActionFailed {
        action: String,
        #[source]
        source: ActionError,
    },

    /// Event store error.
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SagaError {
    /// Returns true if re-invoking the saga with the same starting command
    /// may succeed. Integration errors are never retryable; action errors
    /// carry their own signal.
    pub fn is_retryable(&self) -> bool {
        match self {
            SagaError::ActionFailed { source, .. } => source.is_retryable(),
            _ => false,
        }
    }
}

/// Convenience type alias for saga results.
pub type Result<T, E = SagaError> = std::result::Result<T, E>;

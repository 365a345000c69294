//! Saga actions and flow handlers.

use std::any::Any;

use async_trait::async_trait;

use crate::aggregate::Saga;
use crate::command::{CommandData, NextCommand, SagaCommand};
use crate::error::{ActionError, SagaError};
use crate::events::SagaEvent;

/// What an action invocation produced: events to record, and optionally
/// the command driving the next step.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionResult {
    /// Events to append to the saga's log alongside the completion marker.
    pub events: Vec<SagaEvent>,
    /// The next step's command, or None when this action believes the flow
    /// is finished.
    pub next_command: Option<NextCommand>,
}

impl ActionResult {
    /// No next command: this action considers the flow finished.
    pub fn done() -> Self {
        Self {
            events: Vec::new(),
            next_command: None,
        }
    }

    /// Emits a single next command.
    pub fn next<C: SagaCommand>(command: &C) -> Result<Self, serde_json::Error> {
        Ok(Self {
            events: Vec::new(),
            next_command: Some(NextCommand::of(command)?),
        })
    }

    /// Emits several commands from this single invocation.
    pub fn next_many(commands: Vec<CommandData>) -> Self {
        Self {
            events: Vec::new(),
            next_command: Some(NextCommand::many(commands)),
        }
    }

    /// Attaches events to record with this step.
    pub fn with_events(mut self, events: Vec<SagaEvent>) -> Self {
        self.events = events;
        self
    }

    /// Attaches a single event to record with this step.
    pub fn with_event(mut self, event: SagaEvent) -> Self {
        self.events.push(event);
        self
    }
}

/// A single unit of work within a saga, bound to one required command
/// type.
///
/// Actions must be idempotent and re-entrant: delivery of the triggering
/// request is at-least-once, so the same command may be applied twice
/// against the same saga state.
#[async_trait]
pub trait SagaAction: Send + Sync {
    /// The command type this action consumes.
    type Command: SagaCommand;

    /// Applies the command against the saga's current state.
    async fn apply(
        &self,
        command: Self::Command,
        saga: &Saga,
    ) -> Result<ActionResult, ActionError>;
}

/// Object-safe form of [`SagaAction`] stored in the registry.
///
/// The required command tag is static metadata declared by the typed
/// action's command; the orchestrator reads it to match log entries
/// without inspecting payloads.
#[async_trait]
pub trait DynSagaAction: Send + Sync {
    /// The command type tag this action consumes.
    fn required_command(&self) -> &'static str;

    /// Decodes the command and applies the typed action.
    async fn apply(&self, command: &CommandData, saga: &Saga)
    -> Result<ActionResult, ActionError>;
}

pub(crate) struct ActionAdapter<A>(pub(crate) A);

#[async_trait]
impl<A: SagaAction> DynSagaAction for ActionAdapter<A> {
    fn required_command(&self) -> &'static str {
        A::Command::TAG
    }

    async fn apply(
        &self,
        command: &CommandData,
        saga: &Saga,
    ) -> Result<ActionResult, ActionError> {
        let command = command.decode::<A::Command>()?;
        self.0.apply(command, saga).await
    }
}

/// Invoked once a saga reaches its terminal state; produces the
/// caller-visible result.
///
/// The handler receives the saga's latest persisted state. Its result is
/// downcast to the type the caller asked `apply_blocking` for.
#[async_trait]
pub trait SagaCompletionHandler: Send + Sync {
    async fn handle(&self, saga: &Saga) -> Result<Box<dyn Any + Send>, SagaError>;
}

/// Translates or wraps an action error before it is recorded and
/// re-raised, e.g. to map a provider exception onto a caller-facing one.
pub trait SagaExceptionHandler: Send + Sync {
    fn handle(&self, error: ActionError, saga: &Saga) -> ActionError;
}

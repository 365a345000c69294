//! Saga orchestration engine.
//!
//! Drives a long-running, multi-step distributed operation (a saga) to
//! completion by applying a fixed, ordered sequence of idempotent actions,
//! persisting progress after every step, and supporting resumption after
//! partial failure.
//!
//! The moving parts:
//! 1. A [`SagaFlow`] declares which actions run, in order, plus optional
//!    completion and exception handlers.
//! 2. Each [`SagaAction`] consumes one command type and emits the next
//!    step's command (or none, finishing the flow).
//! 3. The [`SagaOrchestrator`] loads the saga, walks the flow, applies
//!    pending commands, and appends the outcome of every step to the
//!    saga's event log through a [`SagaRepository`].
//!
//! The engine never retries internally. Callers redeliver the triggering
//! request after a failure; completed steps are skipped on re-invocation,
//! so redelivery resumes instead of repeating work.

pub mod action;
pub mod aggregate;
pub mod command;
pub mod error;
pub mod events;
pub mod flow;
pub mod iterator;
pub mod orchestrator;
pub mod registry;
pub mod repository;
pub mod state;

pub use action::{
    ActionResult, DynSagaAction, SagaAction, SagaCompletionHandler, SagaExceptionHandler,
};
pub use aggregate::{RecordedEvent, Saga};
pub use command::{CommandData, NextCommand, SagaCommand};
pub use common::SagaId;
pub use error::{ActionError, Result, SagaError};
pub use events::SagaEvent;
pub use flow::SagaFlow;
pub use iterator::{FlowStep, SagaFlowIterator};
pub use orchestrator::SagaOrchestrator;
pub use registry::SagaRegistry;
pub use repository::{EventSourcedSagaRepository, SagaRepository};
pub use state::SagaState;

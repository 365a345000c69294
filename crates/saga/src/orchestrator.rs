//! Saga orchestrator.
//!
//! Drives one saga through its declared flow to a terminal state. The
//! orchestrator owns no scheduling: it runs on the calling task, persists
//! after every step, and leaves retries to the caller. Re-invocation with
//! the same starting command resumes from the last completed step.

use common::SagaId;

use crate::aggregate::Saga;
use crate::command::{CommandData, SagaCommand};
use crate::error::{Result, SagaError};
use crate::events::SagaEvent;
use crate::flow::SagaFlow;
use crate::iterator::SagaFlowIterator;
use crate::registry::SagaRegistry;
use crate::repository::SagaRepository;

/// Orchestrates saga execution over a repository and a handler registry.
pub struct SagaOrchestrator<R: SagaRepository> {
    repository: R,
    registry: SagaRegistry,
}

impl<R: SagaRepository> SagaOrchestrator<R> {
    /// Creates a new orchestrator.
    pub fn new(repository: R, registry: SagaRegistry) -> Self {
        Self {
            repository,
            registry,
        }
    }

    /// Returns a reference to the underlying repository.
    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Applies a flow against a saga, blocking the caller until the saga
    /// reaches its next natural stopping point.
    ///
    /// If no saga exists under `(saga_name, saga_id)` one is created with
    /// `starting_command` as its first event. A saga that is already
    /// completed skips straight to the completion handler, which makes
    /// redelivery of the triggering request safe.
    ///
    /// Returns the completion handler's result, or None when the flow
    /// declares no completion handler.
    #[tracing::instrument(
        skip(self, flow, starting_command),
        fields(saga_name = %saga_name, saga_id = %saga_id)
    )]
    pub async fn apply_blocking<T, C>(
        &self,
        saga_name: &str,
        saga_id: &str,
        flow: &SagaFlow,
        starting_command: C,
    ) -> Result<Option<T>>
    where
        T: Send + 'static,
        C: SagaCommand,
    {
        let start = std::time::Instant::now();
        metrics::counter!("saga_executions_total").increment(1);

        let id = SagaId::new(saga_name, saga_id);
        let mut saga = self.initialize(&id, &starting_command).await?;

        if saga.is_completed() {
            tracing::debug!(saga = %id, "saga already completed, skipping flow");
            return self.invoke_completion_handler::<T>(flow, &id).await;
        }

        let mut iterator = SagaFlowIterator::new(flow, &self.registry)?;

        while let Some(step) = iterator.next_step(&saga) {
            let required = step.action.required_command();
            if saga.completed_command(required) {
                continue;
            }

            let Some((command_sequence, command)) = saga.next_command(required) else {
                return Err(SagaError::MissingCommand {
                    saga: id,
                    command: required.to_string(),
                    action: step.label,
                });
            };

            tracing::debug!(action = %step.label, command = required, "applying saga action");

            let result = match step.action.apply(&command, &saga).await {
                Ok(result) => {
                    metrics::counter!(
                        "saga_actions_total",
                        "action" => step.label.clone(),
                        "result" => "success"
                    )
                    .increment(1);
                    saga.set_sequence(command_sequence)?;
                    result
                }
                Err(error) => {
                    let error = match flow.exception_handler_id() {
                        Some(handler_id) => self
                            .registry
                            .exception_handler(handler_id)?
                            .handle(error, &saga),
                        None => error,
                    };

                    let mut events = vec![SagaEvent::action_error(
                        &step.label,
                        error.to_string(),
                        error.is_retryable(),
                    )];
                    events.extend(saga.take_pending());
                    self.repository.save(&saga, events).await?;

                    metrics::counter!(
                        "saga_actions_total",
                        "action" => step.label.clone(),
                        "result" => "failure"
                    )
                    .increment(1);
                    metrics::counter!("saga_failed").increment(1);
                    metrics::histogram!("saga_duration_seconds")
                        .record(start.elapsed().as_secs_f64());
                    tracing::warn!(
                        saga = %id,
                        action = %step.label,
                        error = %error,
                        retryable = error.is_retryable(),
                        "saga action failed"
                    );

                    return Err(SagaError::ActionFailed {
                        action: step.label,
                        source: error,
                    });
                }
            };

            let mut batch = result.events;
            batch.push(SagaEvent::command_completed(required));

            match result.next_command {
                Some(next) => {
                    batch.extend(next.into_commands().into_iter().map(SagaEvent::command));
                }
                None => {
                    if iterator.has_more_steps(&saga) && saga.has_unapplied_commands() {
                        saga.complete(false);
                        batch.extend(saga.take_pending());
                        self.repository.save(&saga, batch).await?;

                        metrics::counter!("saga_failed").increment(1);
                        metrics::histogram!("saga_duration_seconds")
                            .record(start.elapsed().as_secs_f64());

                        return Err(SagaError::MissingNextCommand { action: step.label });
                    }
                    saga.complete(true);
                }
            }

            batch.extend(saga.take_pending());
            saga = self.repository.save(&saga, batch).await?;

            if saga.is_completed() {
                break;
            }
        }

        if saga.is_successful() {
            metrics::counter!("saga_completed").increment(1);
            tracing::info!(saga = %id, "saga completed successfully");
        }
        metrics::histogram!("saga_duration_seconds").record(start.elapsed().as_secs_f64());

        self.invoke_completion_handler::<T>(flow, &id).await
    }

    /// Loads the saga, creating and persisting it with the starting
    /// command if no history exists yet.
    async fn initialize<C: SagaCommand>(&self, id: &SagaId, starting_command: &C) -> Result<Saga> {
        match self.repository.get(id).await? {
            Some(saga) => Ok(saga),
            None => {
                let saga = Saga::new(id.clone());
                let command = CommandData::encode(starting_command)?;
                tracing::debug!(saga = %id, command = command.tag(), "initializing saga");
                self.repository
                    .save(&saga, vec![SagaEvent::command(command)])
                    .await
            }
        }
    }

    async fn invoke_completion_handler<T: Send + 'static>(
        &self,
        flow: &SagaFlow,
        id: &SagaId,
    ) -> Result<Option<T>> {
        let Some(handler_id) = flow.completion_handler_id() else {
            return Ok(None);
        };
        let handler = self.registry.completion_handler(handler_id)?;

        // Re-load so the handler sees the final persisted event batch
        let saga = self
            .repository
            .get(id)
            .await?
            .ok_or_else(|| SagaError::SagaNotFound(id.clone()))?;

        let result = handler.handle(&saga).await?;
        match result.downcast::<T>() {
            Ok(value) => Ok(Some(*value)),
            Err(_) => Err(SagaError::CompletionHandlerResult {
                handler: handler_id.to_string(),
            }),
        }
    }
}

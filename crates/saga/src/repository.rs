//! Saga persistence contract.

use async_trait::async_trait;
use common::SagaId;
use event_store::{AppendOptions, EventEnvelope, EventStore};

use crate::aggregate::Saga;
use crate::error::{Result, SagaError};
use crate::events::SagaEvent;

/// Load/save contract for saga aggregates.
///
/// `save` must durably and atomically append `new_events` to the saga's
/// log; the returned aggregate is the refreshed durable state, so callers
/// always read sequences from what was actually persisted.
#[async_trait]
pub trait SagaRepository: Send + Sync {
    /// Loads a saga by identity, replaying its full history.
    ///
    /// Returns None if no history exists.
    async fn get(&self, saga_id: &SagaId) -> Result<Option<Saga>>;

    /// Appends `new_events` to the saga's log and returns the refreshed
    /// aggregate.
    ///
    /// The append is guarded by an expected-sequence check at the saga's
    /// current version: a concurrent writer that advanced the log first
    /// wins, and this save fails with a concurrency conflict.
    async fn save(&self, saga: &Saga, new_events: Vec<SagaEvent>) -> Result<Saga>;
}

/// Saga repository over an [`EventStore`].
#[derive(Clone)]
pub struct EventSourcedSagaRepository<S: EventStore> {
    store: S,
}

impl<S: EventStore> EventSourcedSagaRepository<S> {
    /// Creates a repository backed by the given event store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying event store.
    pub fn store(&self) -> &S {
        &self.store
    }

    fn build_envelopes(saga: &Saga, events: &[SagaEvent]) -> Result<Vec<EventEnvelope>> {
        let mut envelopes = Vec::with_capacity(events.len());
        let mut sequence = saga.version();

        for event in events {
            sequence = sequence.next();
            let envelope = EventEnvelope::builder()
                .saga_id(saga.saga_id().clone())
                .event_type(event.event_type())
                .sequence(sequence)
                .payload(event)?
                .build();
            envelopes.push(envelope);
        }

        Ok(envelopes)
    }
}

#[async_trait]
impl<S: EventStore> SagaRepository for EventSourcedSagaRepository<S> {
    async fn get(&self, saga_id: &SagaId) -> Result<Option<Saga>> {
        let envelopes = self.store.events_for_saga(saga_id).await?;
        if envelopes.is_empty() {
            return Ok(None);
        }

        let mut saga = Saga::new(saga_id.clone());
        for envelope in envelopes {
            let event: SagaEvent = serde_json::from_value(envelope.payload)?;
            saga.apply(envelope.sequence, event);
        }
        Ok(Some(saga))
    }

    async fn save(&self, saga: &Saga, new_events: Vec<SagaEvent>) -> Result<Saga> {
        if !new_events.is_empty() {
            let envelopes = Self::build_envelopes(saga, &new_events)?;
            self.store
                .append(envelopes, AppendOptions::expect_sequence(saga.version()))
                .await?;
        }

        self.get(saga.saga_id())
            .await?
            .ok_or_else(|| SagaError::SagaNotFound(saga.saga_id().clone()))
    }
}

use std::sync::Arc;

use async_trait::async_trait;
use common::SagaId;
use tokio::sync::RwLock;

use crate::{
    EventEnvelope, EventStoreError, Result, Sequence,
    store::{AppendOptions, EventStore, validate_events_for_append},
};

/// In-memory event store implementation for testing.
///
/// Stores all events in memory and provides the same interface and
/// concurrency semantics as the PostgreSQL implementation.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    events: Arc<RwLock<Vec<EventEnvelope>>>,
}

impl InMemoryEventStore {
    /// Creates a new empty in-memory event store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of events stored.
    pub async fn event_count(&self) -> usize {
        self.events.read().await.len()
    }

    /// Clears all events.
    pub async fn clear(&self) {
        self.events.write().await.clear();
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Sequence> {
        validate_events_for_append(&events)?;

        let first_event = &events[0];
        let saga_id = first_event.saga_id.clone();

        let mut store = self.events.write().await;

        // Current sequence for this saga
        let current_sequence = store
            .iter()
            .filter(|e| e.saga_id == saga_id)
            .map(|e| e.sequence)
            .max()
            .unwrap_or(Sequence::initial());

        // Check expected sequence if specified
        if let Some(expected) = options.expected_sequence
            && current_sequence != expected
        {
            return Err(EventStoreError::ConcurrencyConflict {
                saga_id,
                expected,
                actual: current_sequence,
            });
        }

        // Check for sequence conflicts (unique constraint simulation)
        let first_new_sequence = first_event.sequence;
        if first_new_sequence <= current_sequence && current_sequence != Sequence::initial() {
            return Err(EventStoreError::ConcurrencyConflict {
                saga_id,
                expected: options.expected_sequence.unwrap_or(current_sequence),
                actual: current_sequence,
            });
        }

        let last_sequence = events
            .last()
            .map(|e| e.sequence)
            .unwrap_or(Sequence::initial());
        store.extend(events);

        Ok(last_sequence)
    }

    async fn events_for_saga(&self, saga_id: &SagaId) -> Result<Vec<EventEnvelope>> {
        let store = self.events.read().await;
        let mut events: Vec<_> = store
            .iter()
            .filter(|e| &e.saga_id == saga_id)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.sequence);
        Ok(events)
    }

    async fn current_sequence(&self, saga_id: &SagaId) -> Result<Option<Sequence>> {
        let store = self.events.read().await;
        let sequence = store
            .iter()
            .filter(|e| &e.saga_id == saga_id)
            .map(|e| e.sequence)
            .max();
        Ok(sequence)
    }
}

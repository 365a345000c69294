use async_trait::async_trait;
use common::SagaId;

use crate::{EventEnvelope, EventStoreError, Result, Sequence};

/// Options for appending events to the store.
#[derive(Debug, Clone, Default)]
pub struct AppendOptions {
    /// Expected sequence of the saga's log for optimistic concurrency
    /// control. If None, no sequence check is performed (use with caution).
    pub expected_sequence: Option<Sequence>,
}

impl AppendOptions {
    /// Creates options with no sequence check.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates options expecting the saga's log to be at a specific
    /// sequence.
    pub fn expect_sequence(sequence: Sequence) -> Self {
        Self {
            expected_sequence: Some(sequence),
        }
    }

    /// Creates options expecting the saga to have no events yet.
    pub fn expect_new() -> Self {
        Self {
            expected_sequence: Some(Sequence::initial()),
        }
    }
}

/// Core trait for event store implementations.
///
/// An event store persists and retrieves per-saga event logs. All
/// implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends events to the store.
    ///
    /// Events are appended atomically - either all succeed or none do.
    /// If `options.expected_sequence` is set, the operation fails with
    /// `ConcurrencyConflict` when the saga's current sequence doesn't
    /// match. This check is the guard against lost updates when two
    /// callers drive the same saga concurrently: the stale one loses and
    /// must reload before retrying.
    ///
    /// Returns the new sequence of the saga's log after appending.
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Sequence>;

    /// Retrieves all events for a specific saga.
    ///
    /// Events are returned in sequence order (oldest first).
    async fn events_for_saga(&self, saga_id: &SagaId) -> Result<Vec<EventEnvelope>>;

    /// Gets the current sequence of a saga's log.
    ///
    /// Returns None if the saga has no events.
    async fn current_sequence(&self, saga_id: &SagaId) -> Result<Option<Sequence>>;
}

/// Validates events before appending.
///
/// All events must belong to the same saga and carry strictly sequential
/// sequence numbers.
pub fn validate_events_for_append(events: &[EventEnvelope]) -> Result<()> {
    if events.is_empty() {
        return Err(EventStoreError::InvalidAppend(
            "Cannot append empty event list".to_string(),
        ));
    }

    let first = &events[0];
    for event in events.iter().skip(1) {
        if event.saga_id != first.saga_id {
            return Err(EventStoreError::InvalidAppend(
                "All events must belong to the same saga".to_string(),
            ));
        }
    }

    let mut expected = first.sequence;
    for event in events.iter().skip(1) {
        expected = expected.next();
        if event.sequence != expected {
            return Err(EventStoreError::InvalidAppend(format!(
                "Event sequences must be sequential. Expected {}, got {}",
                expected, event.sequence
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(saga_id: SagaId, sequence: i64) -> EventEnvelope {
        EventEnvelope::builder()
            .saga_id(saga_id)
            .event_type("TestEvent")
            .sequence(Sequence::new(sequence))
            .payload_raw(serde_json::json!({}))
            .build()
    }

    #[test]
    fn rejects_empty_batch() {
        let result = validate_events_for_append(&[]);
        assert!(matches!(result, Err(EventStoreError::InvalidAppend(_))));
    }

    #[test]
    fn rejects_mixed_sagas() {
        let events = vec![
            envelope(SagaId::new("deploy", "a"), 1),
            envelope(SagaId::new("deploy", "b"), 2),
        ];
        let result = validate_events_for_append(&events);
        assert!(matches!(result, Err(EventStoreError::InvalidAppend(_))));
    }

    #[test]
    fn rejects_sequence_gap() {
        let id = SagaId::new("deploy", "a");
        let events = vec![envelope(id.clone(), 1), envelope(id, 3)];
        let result = validate_events_for_append(&events);
        assert!(matches!(result, Err(EventStoreError::InvalidAppend(_))));
    }

    #[test]
    fn accepts_sequential_batch() {
        let id = SagaId::new("deploy", "a");
        let events = vec![
            envelope(id.clone(), 1),
            envelope(id.clone(), 2),
            envelope(id, 3),
        ];
        assert!(validate_events_for_append(&events).is_ok());
    }
}

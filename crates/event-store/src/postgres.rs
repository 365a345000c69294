use std::collections::HashMap;

use async_trait::async_trait;
use common::SagaId;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    EventEnvelope, EventId, EventStoreError, PostgresConfig, Result, Sequence,
    store::{AppendOptions, EventStore, validate_events_for_append},
};

/// PostgreSQL-backed event store implementation.
#[derive(Clone)]
pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    /// Creates a new PostgreSQL event store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to PostgreSQL using the given configuration.
    pub async fn connect(config: &PostgresConfig) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_event(row: PgRow) -> Result<EventEnvelope> {
        let metadata_json: serde_json::Value = row.try_get("metadata")?;
        let metadata: HashMap<String, serde_json::Value> = serde_json::from_value(metadata_json)?;

        Ok(EventEnvelope {
            event_id: EventId::from_uuid(row.try_get::<Uuid, _>("id")?),
            event_type: row.try_get("event_type")?,
            saga_id: SagaId::new(
                row.try_get::<String, _>("saga_name")?,
                row.try_get::<String, _>("saga_id")?,
            ),
            sequence: Sequence::new(row.try_get("sequence")?),
            timestamp: row.try_get("timestamp")?,
            payload: row.try_get("payload")?,
            metadata,
        })
    }
}

#[async_trait]
impl EventStore for PostgresEventStore {
    #[tracing::instrument(skip(self, events), fields(count = events.len()))]
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Sequence> {
        validate_events_for_append(&events)?;

        let first_event = &events[0];
        let saga_id = first_event.saga_id.clone();

        let mut tx = self.pool.begin().await?;

        // Check expected sequence if specified
        if let Some(expected) = options.expected_sequence {
            let current_sequence: Option<i64> = sqlx::query_scalar(
                "SELECT MAX(sequence) FROM saga_events WHERE saga_name = $1 AND saga_id = $2",
            )
            .bind(saga_id.name())
            .bind(saga_id.id())
            .fetch_one(&mut *tx)
            .await?;

            let actual = Sequence::new(current_sequence.unwrap_or(0));

            if actual != expected {
                return Err(EventStoreError::ConcurrencyConflict {
                    saga_id,
                    expected,
                    actual,
                });
            }
        }

        let mut last_sequence = Sequence::initial();
        for event in &events {
            let metadata_json = serde_json::to_value(&event.metadata)?;

            sqlx::query(
                r#"
                INSERT INTO saga_events (id, event_type, saga_name, saga_id, sequence, timestamp, payload, metadata)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(event.event_id.as_uuid())
            .bind(&event.event_type)
            .bind(event.saga_id.name())
            .bind(event.saga_id.id())
            .bind(event.sequence.as_i64())
            .bind(event.timestamp)
            .bind(&event.payload)
            .bind(metadata_json)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                // A unique constraint violation means another writer took
                // this sequence first
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.constraint() == Some("unique_saga_sequence")
                {
                    return EventStoreError::ConcurrencyConflict {
                        saga_id: saga_id.clone(),
                        expected: options.expected_sequence.unwrap_or(Sequence::initial()),
                        actual: event.sequence,
                    };
                }
                EventStoreError::Database(e)
            })?;

            last_sequence = event.sequence;
        }

        tx.commit().await?;
        Ok(last_sequence)
    }

    async fn events_for_saga(&self, saga_id: &SagaId) -> Result<Vec<EventEnvelope>> {
        let rows = sqlx::query(
            r#"
            SELECT id, event_type, saga_name, saga_id, sequence, timestamp, payload, metadata
            FROM saga_events
            WHERE saga_name = $1 AND saga_id = $2
            ORDER BY sequence ASC
            "#,
        )
        .bind(saga_id.name())
        .bind(saga_id.id())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_event).collect()
    }

    async fn current_sequence(&self, saga_id: &SagaId) -> Result<Option<Sequence>> {
        let sequence: Option<i64> = sqlx::query_scalar(
            "SELECT MAX(sequence) FROM saga_events WHERE saga_name = $1 AND saga_id = $2",
        )
        .bind(saga_id.name())
        .bind(saga_id.id())
        .fetch_one(&self.pool)
        .await?;

        Ok(sequence.map(Sequence::new))
    }
}

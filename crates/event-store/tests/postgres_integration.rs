//! PostgreSQL integration tests
//!
//! These tests share one PostgreSQL container and truncate the log between
//! tests, so they are marked `#[serial]`.

use std::sync::Arc;

use event_store::{
    AppendOptions, EventEnvelope, EventStore, EventStoreError, PostgresEventStore, SagaId,
    Sequence,
};
use serial_test::serial;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            // Create a temporary pool just for migrations
            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_saga_events_table.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();

            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and a cleared log
async fn get_test_store() -> PostgresEventStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE saga_events")
        .execute(&pool)
        .await
        .unwrap();

    PostgresEventStore::new(pool)
}

fn create_test_event(saga_id: SagaId, sequence: Sequence, event_type: &str) -> EventEnvelope {
    EventEnvelope::builder()
        .saga_id(saga_id)
        .event_type(event_type)
        .sequence(sequence)
        .payload_raw(serde_json::json!({"test": true}))
        .build()
}

#[tokio::test]
#[serial]
async fn append_and_retrieve_events() {
    let store = get_test_store().await;
    let saga_id = SagaId::new("deploy", "pg-1");

    let event = create_test_event(saga_id.clone(), Sequence::first(), "TestEvent");
    let result = store.append(vec![event], AppendOptions::expect_new()).await;
    assert!(result.is_ok());
    assert_eq!(result.unwrap(), Sequence::first());

    let events = store.events_for_saga(&saga_id).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, "TestEvent");
    assert_eq!(events[0].sequence, Sequence::first());
    assert_eq!(events[0].saga_id, saga_id);
}

#[tokio::test]
#[serial]
async fn append_multiple_events_atomically() {
    let store = get_test_store().await;
    let saga_id = SagaId::new("deploy", "pg-1");

    let events = vec![
        create_test_event(saga_id.clone(), Sequence::new(1), "Event1"),
        create_test_event(saga_id.clone(), Sequence::new(2), "Event2"),
        create_test_event(saga_id.clone(), Sequence::new(3), "Event3"),
    ];

    let result = store.append(events, AppendOptions::expect_new()).await;
    assert_eq!(result.unwrap(), Sequence::new(3));

    let stored = store.events_for_saga(&saga_id).await.unwrap();
    assert_eq!(stored.len(), 3);
    let sequences: Vec<i64> = stored.iter().map(|e| e.sequence.as_i64()).collect();
    assert_eq!(sequences, vec![1, 2, 3]);
}

#[tokio::test]
#[serial]
async fn concurrency_conflict_on_stale_sequence() {
    let store = get_test_store().await;
    let saga_id = SagaId::new("deploy", "pg-1");

    let event1 = create_test_event(saga_id.clone(), Sequence::first(), "Event1");
    store
        .append(vec![event1], AppendOptions::expect_new())
        .await
        .unwrap();

    // A writer with a stale view of the log expects sequence 0
    let event2 = create_test_event(saga_id, Sequence::new(2), "Event2");
    let result = store
        .append(
            vec![event2],
            AppendOptions::expect_sequence(Sequence::initial()),
        )
        .await;

    assert!(matches!(
        result,
        Err(EventStoreError::ConcurrencyConflict { .. })
    ));
}

#[tokio::test]
#[serial]
async fn unique_constraint_rejects_duplicate_sequence() {
    let store = get_test_store().await;
    let saga_id = SagaId::new("deploy", "pg-1");

    let event1 = create_test_event(saga_id.clone(), Sequence::first(), "Event1");
    store
        .append(vec![event1], AppendOptions::new())
        .await
        .unwrap();

    // Same sequence, no expectation: the unique constraint catches it
    let event2 = create_test_event(saga_id, Sequence::first(), "Event2");
    let result = store.append(vec![event2], AppendOptions::new()).await;

    assert!(matches!(
        result,
        Err(EventStoreError::ConcurrencyConflict { .. })
    ));
}

#[tokio::test]
#[serial]
async fn sagas_with_same_instance_id_but_different_names_are_isolated() {
    let store = get_test_store().await;
    let deploy = SagaId::new("deploy", "shared-id");
    let teardown = SagaId::new("teardown", "shared-id");

    store
        .append(
            vec![create_test_event(
                deploy.clone(),
                Sequence::first(),
                "Event1",
            )],
            AppendOptions::expect_new(),
        )
        .await
        .unwrap();
    store
        .append(
            vec![create_test_event(
                teardown.clone(),
                Sequence::first(),
                "Event2",
            )],
            AppendOptions::expect_new(),
        )
        .await
        .unwrap();

    let deploy_events = store.events_for_saga(&deploy).await.unwrap();
    let teardown_events = store.events_for_saga(&teardown).await.unwrap();
    assert_eq!(deploy_events.len(), 1);
    assert_eq!(teardown_events.len(), 1);
    assert_eq!(deploy_events[0].event_type, "Event1");
    assert_eq!(teardown_events[0].event_type, "Event2");
}

#[tokio::test]
#[serial]
async fn current_sequence_reflects_log_tail() {
    let store = get_test_store().await;
    let saga_id = SagaId::new("deploy", "pg-1");

    assert_eq!(store.current_sequence(&saga_id).await.unwrap(), None);

    let events = vec![
        create_test_event(saga_id.clone(), Sequence::new(1), "Event1"),
        create_test_event(saga_id.clone(), Sequence::new(2), "Event2"),
    ];
    store
        .append(events, AppendOptions::expect_new())
        .await
        .unwrap();

    assert_eq!(
        store.current_sequence(&saga_id).await.unwrap(),
        Some(Sequence::new(2))
    );
}

#[tokio::test]
#[serial]
async fn payload_and_metadata_roundtrip() {
    let store = get_test_store().await;
    let saga_id = SagaId::new("deploy", "pg-1");

    let envelope = EventEnvelope::builder()
        .saga_id(saga_id.clone())
        .event_type("CommandCompleted")
        .sequence(Sequence::first())
        .payload_raw(serde_json::json!({
            "type": "CommandCompleted",
            "data": { "command": "deploy/prepare" }
        }))
        .metadata("caller", serde_json::json!("worker-7"))
        .build();

    store
        .append(vec![envelope], AppendOptions::expect_new())
        .await
        .unwrap();

    let events = store.events_for_saga(&saga_id).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(
        events[0].payload["data"]["command"],
        serde_json::json!("deploy/prepare")
    );
    assert_eq!(
        events[0].metadata.get("caller"),
        Some(&serde_json::json!("worker-7"))
    );
}

pub mod config;
pub mod error;
pub mod event;
pub mod memory;
pub mod postgres;
pub mod store;

pub use common::SagaId;
pub use config::PostgresConfig;
pub use error::{EventStoreError, Result};
pub use event::{EventEnvelope, EventEnvelopeBuilder, EventId, Sequence};
pub use memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use store::{AppendOptions, EventStore};

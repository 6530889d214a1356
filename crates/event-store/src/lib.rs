//! Append-only event log with per-aggregate optimistic concurrency.
//!
//! - [`EventStore`] is the persistence boundary used by the command side
//!   (`append`, `read_stream`) and by projection consumers (`read_all_from`).
//! - [`InMemoryEventStore`] keeps one lock per aggregate stream.
//! - [`PostgresEventStore`] is the durable adapter.

pub mod error;
pub mod event;
pub mod feed;
pub mod memory;
pub mod postgres;
pub mod store;

pub use common::AggregateId;
pub use error::{EventStoreError, Result};
pub use event::{EventEnvelope, EventEnvelopeBuilder, EventId, Version};
pub use feed::{FeedPosition, RecordedEvent};
pub use memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use store::{EventStore, EventStoreExt, StreamHistory};

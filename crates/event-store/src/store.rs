use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::{
    AggregateId, EventEnvelope, EventStoreError, FeedPosition, RecordedEvent, Result, Version,
};

/// The full history of one aggregate stream.
#[derive(Debug, Clone, Default)]
pub struct StreamHistory {
    /// Events ordered by version, oldest first.
    pub events: Vec<EventEnvelope>,

    /// Version of the last event, or `Version::initial()` for no stream.
    pub version: Version,
}

impl StreamHistory {
    /// Returns true if the stream has no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Core trait for event store implementations.
///
/// An event store is an append-only log partitioned by aggregate ID.
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends events to an aggregate stream.
    ///
    /// `expected_version` is the stream version the caller last observed
    /// (`Version::initial()` for a stream that should not exist yet). If the
    /// stored version differs the call fails with `ConcurrencyConflict` and
    /// nothing is written. Events are appended atomically: either all of
    /// them become visible or none do.
    ///
    /// Returns the new version of the aggregate after appending.
    async fn append(
        &self,
        aggregate_id: &AggregateId,
        expected_version: Version,
        events: Vec<EventEnvelope>,
    ) -> Result<Version>;

    /// Reads the complete ordered history of an aggregate.
    ///
    /// An unknown aggregate yields an empty history at `Version::initial()`.
    async fn read_stream(&self, aggregate_id: &AggregateId) -> Result<StreamHistory>;

    /// Gets the current version of an aggregate (`Version::initial()` if none).
    async fn get_aggregate_version(&self, aggregate_id: &AggregateId) -> Result<Version>;

    /// Reads events across all aggregates in feed order.
    ///
    /// Returns at most `limit` events positioned strictly after `after`;
    /// pass [`FeedPosition::start()`] to read from the beginning. Only
    /// events of finished appends are returned, so an event that is not
    /// visible yet always sorts after the last one returned.
    async fn read_all_from(&self, after: FeedPosition, limit: usize)
    -> Result<Vec<RecordedEvent>>;

    /// Returns a handle that is notified after every successful append, if
    /// the backend supports push notification. Consumers fall back to
    /// polling when this is `None`.
    fn append_notifier(&self) -> Option<Arc<Notify>> {
        None
    }
}

#[async_trait]
impl<T: EventStore + ?Sized> EventStore for Arc<T> {
    async fn append(
        &self,
        aggregate_id: &AggregateId,
        expected_version: Version,
        events: Vec<EventEnvelope>,
    ) -> Result<Version> {
        (**self).append(aggregate_id, expected_version, events).await
    }

    async fn read_stream(&self, aggregate_id: &AggregateId) -> Result<StreamHistory> {
        (**self).read_stream(aggregate_id).await
    }

    async fn get_aggregate_version(&self, aggregate_id: &AggregateId) -> Result<Version> {
        (**self).get_aggregate_version(aggregate_id).await
    }

    async fn read_all_from(&self, after: FeedPosition, limit: usize) -> Result<Vec<RecordedEvent>> {
        (**self).read_all_from(after, limit).await
    }

    fn append_notifier(&self) -> Option<Arc<Notify>> {
        (**self).append_notifier()
    }
}

/// Extension trait providing convenience methods for event stores.
#[async_trait]
pub trait EventStoreExt: EventStore {
    /// Appends a single event to the store.
    async fn append_event(
        &self,
        aggregate_id: &AggregateId,
        expected_version: Version,
        event: EventEnvelope,
    ) -> Result<Version> {
        self.append(aggregate_id, expected_version, vec![event]).await
    }

    /// Checks if an aggregate exists (has any events).
    async fn aggregate_exists(&self, aggregate_id: &AggregateId) -> Result<bool> {
        Ok(!self.get_aggregate_version(aggregate_id).await?.is_initial())
    }
}

// Blanket implementation for all EventStore implementations
impl<T: EventStore + ?Sized> EventStoreExt for T {}

/// Validates a batch before it is appended to `aggregate_id` at
/// `expected_version`.
///
/// The batch must be non-empty, belong to a single aggregate and aggregate
/// type, and carry versions `expected_version + 1, + 2, ...` with no gaps.
pub fn validate_events_for_append(
    aggregate_id: &AggregateId,
    expected_version: Version,
    events: &[EventEnvelope],
) -> Result<()> {
    let Some(first) = events.first() else {
        return Err(EventStoreError::InvalidAppend(
            "Cannot append empty event list".to_string(),
        ));
    };

    let mut version = expected_version;
    for event in events {
        if &event.aggregate_id != aggregate_id {
            return Err(EventStoreError::InvalidAppend(format!(
                "Event for aggregate {} appended to stream {}",
                event.aggregate_id, aggregate_id
            )));
        }
        if event.aggregate_type != first.aggregate_type {
            return Err(EventStoreError::InvalidAppend(
                "All events must have the same aggregate type".to_string(),
            ));
        }
        version = version.next();
        if event.version != version {
            return Err(EventStoreError::InvalidAppend(format!(
                "Event versions must be sequential. Expected {}, got {}",
                version, event.version
            )));
        }
    }

    Ok(())
}

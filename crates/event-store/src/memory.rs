use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify, RwLock};

use crate::{
    AggregateId, EventEnvelope, EventStoreError, FeedPosition, RecordedEvent, Result, Version,
    store::{EventStore, StreamHistory, validate_events_for_append},
};

type Stream = Arc<Mutex<Vec<EventEnvelope>>>;

/// The global feed. Every append is one transaction.
#[derive(Default)]
struct Log {
    events: Vec<RecordedEvent>,
    transactions: u64,
}

impl Log {
    fn record(&mut self, events: &[EventEnvelope]) {
        self.transactions += 1;
        for event in events {
            let sequence = self.events.len() as u64 + 1;
            self.events.push(RecordedEvent {
                position: FeedPosition::new(self.transactions, sequence),
                event: event.clone(),
            });
        }
    }
}

/// In-memory event store implementation.
///
/// Each aggregate stream sits behind its own lock, so appends to different
/// aggregates never contend on the version check. A separate global log
/// records every event in append order for projection consumers.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    streams: Arc<RwLock<HashMap<AggregateId, Stream>>>,
    log: Arc<RwLock<Log>>,
    appended: Arc<Notify>,
}

impl InMemoryEventStore {
    /// Creates a new empty in-memory event store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of events stored.
    pub async fn event_count(&self) -> usize {
        self.log.read().await.events.len()
    }

    /// Returns the number of distinct aggregate streams.
    pub async fn stream_count(&self) -> usize {
        self.streams.read().await.len()
    }

    async fn existing_stream(&self, aggregate_id: &AggregateId) -> Option<Stream> {
        self.streams.read().await.get(aggregate_id).cloned()
    }

    async fn stream_for_append(&self, aggregate_id: &AggregateId) -> Stream {
        if let Some(stream) = self.existing_stream(aggregate_id).await {
            return stream;
        }
        let mut streams = self.streams.write().await;
        Arc::clone(streams.entry(aggregate_id.clone()).or_default())
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(
        &self,
        aggregate_id: &AggregateId,
        expected_version: Version,
        events: Vec<EventEnvelope>,
    ) -> Result<Version> {
        validate_events_for_append(aggregate_id, expected_version, &events)?;

        let stream = self.stream_for_append(aggregate_id).await;
        let mut stream = stream.lock().await;

        let actual = Version::new(stream.len() as i64);
        if actual != expected_version {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id: aggregate_id.clone(),
                expected: expected_version,
                actual,
            });
        }

        let new_version = events.last().map(|e| e.version).unwrap_or(actual);
        let count = events.len() as u64;

        let mut log = self.log.write().await;
        // No await between the two writes: a cancelled append leaves neither.
        log.record(&events);
        stream.extend(events);
        drop(log);
        drop(stream);

        self.appended.notify_one();
        metrics::counter!("events_appended_total").increment(count);
        tracing::trace!(%aggregate_id, version = %new_version, "events appended");

        Ok(new_version)
    }

    async fn read_stream(&self, aggregate_id: &AggregateId) -> Result<StreamHistory> {
        let Some(stream) = self.existing_stream(aggregate_id).await else {
            return Ok(StreamHistory::default());
        };
        let events = stream.lock().await.clone();
        let version = events.last().map(|e| e.version).unwrap_or_default();
        Ok(StreamHistory { events, version })
    }

    async fn get_aggregate_version(&self, aggregate_id: &AggregateId) -> Result<Version> {
        let Some(stream) = self.existing_stream(aggregate_id).await else {
            return Ok(Version::initial());
        };
        let stream = stream.lock().await;
        Ok(stream.last().map(|e| e.version).unwrap_or_default())
    }

    async fn read_all_from(
        &self,
        after: FeedPosition,
        limit: usize,
    ) -> Result<Vec<RecordedEvent>> {
        let log = self.log.read().await;
        let start = log.events.partition_point(|r| r.position <= after);
        Ok(log.events[start..].iter().take(limit).cloned().collect())
    }

    fn append_notifier(&self) -> Option<Arc<Notify>> {
        Some(Arc::clone(&self.appended))
    }
}

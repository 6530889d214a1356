use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::{AggregateId, EventStoreError, Result};

/// Unique identifier for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random event ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an event ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-aggregate sequence number, used for optimistic concurrency control.
///
/// `Version::initial()` (0) denotes a stream that does not exist yet. The
/// first event of a stream carries version 1 and every following event
/// increments it by exactly one, so a stream is always gapless.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Creates a new version from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the version of an aggregate with no events (0).
    pub fn initial() -> Self {
        Self(0)
    }

    /// Returns the version of the first event of a stream (1).
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the next version.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns true if this is the "no stream" version.
    pub fn is_initial(&self) -> bool {
        self.0 == 0
    }

    /// Returns the raw version value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Version {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Version> for i64 {
    fn from(version: Version) -> Self {
        version.0
    }
}

/// An immutable domain event together with its storage metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique identifier for this event.
    pub event_id: EventId,

    /// The variant tag of the event (e.g., "ProductCreated").
    pub event_type: String,

    /// The aggregate this event belongs to.
    pub aggregate_id: AggregateId,

    /// The type of aggregate (e.g., "Product").
    pub aggregate_type: String,

    /// Sequence number of this event within its aggregate stream.
    pub version: Version,

    /// When the event was recorded.
    pub timestamp: DateTime<Utc>,

    /// The event payload as JSON.
    pub payload: serde_json::Value,

    /// Additional metadata about the event.
    pub metadata: HashMap<String, serde_json::Value>,
}

impl EventEnvelope {
    /// Creates a new event envelope builder.
    pub fn builder() -> EventEnvelopeBuilder {
        EventEnvelopeBuilder::default()
    }

    /// Deserializes the payload into a concrete event type.
    pub fn decode<T: DeserializeOwned>(&self) -> std::result::Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

/// Builder for constructing event envelopes.
#[derive(Debug, Default)]
pub struct EventEnvelopeBuilder {
    event_id: Option<EventId>,
    event_type: Option<String>,
    aggregate_id: Option<AggregateId>,
    aggregate_type: Option<String>,
    version: Option<Version>,
    timestamp: Option<DateTime<Utc>>,
    payload: Option<serde_json::Value>,
    metadata: HashMap<String, serde_json::Value>,
}

impl EventEnvelopeBuilder {
    /// Sets the event ID. If not set, a new ID will be generated.
    pub fn event_id(mut self, id: EventId) -> Self {
        self.event_id = Some(id);
        self
    }

    /// Sets the event type.
    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    /// Sets the aggregate ID.
    pub fn aggregate_id(mut self, id: AggregateId) -> Self {
        self.aggregate_id = Some(id);
        self
    }

    /// Sets the aggregate type.
    pub fn aggregate_type(mut self, aggregate_type: impl Into<String>) -> Self {
        self.aggregate_type = Some(aggregate_type.into());
        self
    }

    /// Sets the version.
    pub fn version(mut self, version: Version) -> Self {
        self.version = Some(version);
        self
    }

    /// Sets the timestamp. If not set, the current time will be used.
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Sets the payload from a serializable value.
    pub fn payload<T: Serialize>(mut self, payload: &T) -> Result<Self> {
        self.payload = Some(serde_json::to_value(payload)?);
        Ok(self)
    }

    /// Sets the payload from a raw JSON value.
    pub fn payload_raw(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Adds a metadata entry.
    pub fn metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Builds the event envelope.
    ///
    /// Fails with [`EventStoreError::InvalidAppend`] naming the first missing
    /// required field (event_type, aggregate_id, aggregate_type, version,
    /// payload).
    pub fn build(self) -> Result<EventEnvelope> {
        fn required<T>(value: Option<T>, field: &str) -> Result<T> {
            value.ok_or_else(|| EventStoreError::InvalidAppend(format!("{field} is required")))
        }

        Ok(EventEnvelope {
            event_id: self.event_id.unwrap_or_default(),
            event_type: required(self.event_type, "event_type")?,
            aggregate_id: required(self.aggregate_id, "aggregate_id")?,
            aggregate_type: required(self.aggregate_type, "aggregate_type")?,
            version: required(self.version, "version")?,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            payload: required(self.payload, "payload")?,
            metadata: self.metadata,
        })
    }
}

//! Projection error types.

use common::AggregateId;
use event_store::Version;
use thiserror::Error;

/// Errors that can occur during projection processing.
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// An error occurred in the event store.
    #[error("Event store error: {0}")]
    EventStore(#[from] event_store::EventStoreError),

    /// Failed to deserialize an event payload.
    #[error("Event deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// The event does not directly follow the last one applied for its
    /// aggregate. Resolved by buffering and redelivery.
    #[error(
        "Projection gap for aggregate {aggregate_id}: expected version {expected}, found {found}"
    )]
    Gap {
        aggregate_id: AggregateId,
        expected: Version,
        found: Version,
    },

    /// The read model store failed.
    #[error("Read model error: {0}")]
    ReadModel(String),
}

impl ProjectionError {
    /// Returns true if the event arrived ahead of its predecessors.
    pub fn is_gap(&self) -> bool {
        matches!(self, ProjectionError::Gap { .. })
    }

    /// Returns true if the event itself can never be applied, however often
    /// it is delivered.
    pub fn is_malformed_event(&self) -> bool {
        matches!(self, ProjectionError::Deserialization(_))
    }
}

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;

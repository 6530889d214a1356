use thiserror::Error;

use crate::{AggregateId, Version};

/// Errors that can occur when interacting with the event store.
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// A concurrency conflict occurred when appending events.
    /// The expected version did not match the actual version.
    #[error(
        "Concurrency conflict for aggregate {aggregate_id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        aggregate_id: AggregateId,
        expected: Version,
        actual: Version,
    },

    /// The storage backend failed or could not be reached.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The batch handed to `append` is malformed.
    #[error("Invalid append: {0}")]
    InvalidAppend(String),
}

impl EventStoreError {
    /// Returns true if this error is a lost optimistic-concurrency race.
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, EventStoreError::ConcurrencyConflict { .. })
    }
}

/// Result type for event store operations.
pub type Result<T> = std::result::Result<T, EventStoreError>;

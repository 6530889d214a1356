//! Domain error types.

use common::AggregateId;
use event_store::EventStoreError;
use thiserror::Error;

use crate::product::ProductError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The product aggregate rejected the command.
    #[error(transparent)]
    Product(#[from] ProductError),

    /// An error occurred in the event store.
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    /// Every attempt lost the optimistic-concurrency race.
    #[error("Aggregate {aggregate_id} is busy: concurrency conflict after {attempts} attempts")]
    ConcurrencyExhausted {
        aggregate_id: AggregateId,
        attempts: u32,
    },

    /// A stored event could not be decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    /// Short, stable label for metrics and logs.
    pub fn reason(&self) -> &'static str {
        match self {
            DomainError::Product(e) => e.kind(),
            DomainError::EventStore(EventStoreError::StorageUnavailable(_)) => {
                "storage_unavailable"
            }
            DomainError::EventStore(_) => "event_store",
            DomainError::ConcurrencyExhausted { .. } => "concurrency_exhausted",
            DomainError::Serialization(_) => "serialization",
        }
    }
}

//! Positions in the global event feed.

use serde::{Deserialize, Serialize};

use crate::EventEnvelope;

/// A point in the global feed, assigned by the store when an event is
/// written.
///
/// Positions order first by the appending transaction and then by the
/// sequence number within the log. A store only hands out events whose
/// transaction has finished, and every transaction still running or yet to
/// start sorts after them, so reading strictly after the last consumed
/// position never skips an event.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct FeedPosition {
    /// Identifier of the appending transaction.
    pub transaction: u64,

    /// Position of the event in the log.
    pub sequence: u64,
}

impl FeedPosition {
    /// Creates a position from its parts.
    pub fn new(transaction: u64, sequence: u64) -> Self {
        Self {
            transaction,
            sequence,
        }
    }

    /// The position before the first event.
    pub fn start() -> Self {
        Self::default()
    }
}

impl std::fmt::Display for FeedPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.transaction, self.sequence)
    }
}

/// An event as read from the global feed.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedEvent {
    /// Where the event sits in the feed.
    pub position: FeedPosition,

    /// The stored event.
    pub event: EventEnvelope,
}

//! Core projection trait and position tracking.

use async_trait::async_trait;
use event_store::{EventEnvelope, FeedPosition};

use crate::Result;

/// Tracks how far the global feed has been consumed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectionPosition {
    /// Number of events consumed since the start of the feed.
    pub events_processed: u64,

    /// Feed position of the last consumed event. Reading resumes after it.
    pub last: FeedPosition,
}

impl ProjectionPosition {
    /// Creates a new position at zero.
    pub fn zero() -> Self {
        Self::default()
    }

    /// Advances the position past the event at `to`.
    pub fn advance(&self, to: FeedPosition) -> Self {
        Self {
            events_processed: self.events_processed + 1,
            last: to,
        }
    }
}

impl std::fmt::Display for ProjectionPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "position({} @ {})", self.events_processed, self.last)
    }
}

/// What a projection did with one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The event advanced the read model.
    Applied,

    /// The event was already applied; nothing changed.
    Duplicate,

    /// The event is of no interest to this projection.
    Ignored,
}

/// A projection that processes events and updates a read model.
///
/// Projections must tolerate redelivery: handing them an event they have
/// already applied returns [`Outcome::Duplicate`] and changes nothing. An
/// event that arrives before its predecessors fails with
/// [`ProjectionError::Gap`](crate::ProjectionError::Gap).
#[async_trait]
pub trait Projection: Send + Sync {
    /// Returns the name of this projection.
    fn name(&self) -> &'static str;

    /// Handles a single event, updating the projection's read model.
    async fn handle(&self, event: &EventEnvelope) -> Result<Outcome>;

    /// Resets the projection to its initial state.
    async fn reset(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_starts_at_zero() {
        let pos = ProjectionPosition::zero();
        assert_eq!(pos.events_processed, 0);
        assert_eq!(pos.last, FeedPosition::start());
        assert_eq!(pos, ProjectionPosition::default());
    }

    #[test]
    fn position_advances_to_the_consumed_event() {
        let pos = ProjectionPosition::zero().advance(FeedPosition::new(4, 9));
        assert_eq!(pos.events_processed, 1);
        assert_eq!(pos.last, FeedPosition::new(4, 9));

        // A late commit can carry a smaller sequence than the one before it.
        let pos = pos.advance(FeedPosition::new(6, 8));
        assert_eq!(pos.events_processed, 2);
        assert_eq!(pos.last, FeedPosition::new(6, 8));
    }

    #[test]
    fn position_display() {
        let pos = ProjectionPosition {
            events_processed: 42,
            last: FeedPosition::new(7, 40),
        };
        assert_eq!(pos.to_string(), "position(42 @ 7:40)");
    }
}

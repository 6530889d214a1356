//! Core aggregate and domain event traits.

use common::AggregateId;
use event_store::Version;
use serde::{Serialize, de::DeserializeOwned};

use crate::command::Command;

/// Trait for domain events.
///
/// Domain events represent facts that have happened in the domain.
/// They are immutable and should be named in past tense.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Returns the event type name.
    ///
    /// Stored as the envelope's `event_type`.
    fn event_type(&self) -> &'static str;
}

/// Trait for aggregates in an event-sourced system.
///
/// An aggregate is the consistency boundary for the commands of one entity.
///
/// In event sourcing, aggregates:
/// - Are rebuilt by replaying events from the default state
/// - Turn commands into events, or reject them
/// - Apply events to update state (pure, deterministic)
pub trait Aggregate: Default + Send + Sync + Sized {
    /// The type of events this aggregate produces and consumes.
    type Event: DomainEvent;

    /// The closed set of commands this aggregate accepts.
    type Command: Command;

    /// The type of errors this aggregate can produce.
    type Error: std::error::Error + Send + Sync;

    /// Returns the aggregate type name.
    ///
    /// Used for event store organization and routing.
    fn aggregate_type() -> &'static str;

    /// Returns the aggregate's unique identifier.
    ///
    /// Returns None for a new, uninitialized aggregate.
    fn id(&self) -> Option<AggregateId>;

    /// Returns the current version of the aggregate.
    ///
    /// Version starts at 0 for a new aggregate and increments with each event.
    fn version(&self) -> Version;

    /// Sets the aggregate version.
    ///
    /// Called by the command handler after loading events.
    fn set_version(&mut self, version: Version);

    /// Validates `command` against the current state.
    ///
    /// Returns the events to append, or a rejection. Must not mutate state;
    /// the dispatcher applies the returned events only after they are stored.
    fn handle(
        &self,
        aggregate_id: &AggregateId,
        command: Self::Command,
    ) -> Result<Vec<Self::Event>, Self::Error>;

    /// Applies an event to the aggregate, updating its state.
    ///
    /// This method must be pure and deterministic:
    /// - Given the same state and event, it must always produce the same new state
    /// - It must not have side effects
    /// - It must not fail (events represent facts that have happened)
    fn apply(&mut self, event: Self::Event);

    /// Applies multiple events in sequence.
    fn apply_events(&mut self, events: impl IntoIterator<Item = Self::Event>) {
        for event in events {
            self.apply(event);
        }
    }
}

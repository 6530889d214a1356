//! Shared types for the inventory event-sourcing workspace.

mod types;

pub use types::AggregateId;

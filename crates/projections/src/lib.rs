//! Read model and projections for the CQRS query side.
//!
//! This crate provides the query side of the CQRS pattern:
//! - [`Projection`] trait for processing events into read models
//! - [`ProductReadModel`] storage for product views, with an in-memory store
//! - [`ProductProjection`], which applies product events with a per-product watermark
//! - [`ProjectionSynchronizer`] for feeding events from the store to projections
//! - [`ProductQueries`], the read-only entry point for callers

pub mod error;
pub mod projection;
pub mod queries;
pub mod read_model;
pub mod synchronizer;
pub mod views;

pub use error::{ProjectionError, Result};
pub use projection::{Outcome, Projection, ProjectionPosition};
pub use queries::ProductQueries;
pub use read_model::{InMemoryProductStore, ProductReadModel, ProductView};
pub use synchronizer::{ProjectionSynchronizer, SyncProgress, SyncReport, SynchronizerConfig};
pub use views::ProductProjection;

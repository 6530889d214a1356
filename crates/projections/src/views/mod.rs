//! Projections that maintain read model views.

pub mod product;

pub use product::ProductProjection;

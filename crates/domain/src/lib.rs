//! Domain layer for the inventory event-sourcing system.
//!
//! This crate provides the core domain abstractions including:
//! - Aggregate trait for event-sourced entities
//! - DomainEvent and Command traits for the closed sets of events and commands
//! - CommandHandler, the load-handle-append dispatcher with bounded retry
//! - Product aggregate and the InventoryService built on top of it

pub mod aggregate;
pub mod command;
pub mod error;
pub mod product;

pub use aggregate::{Aggregate, DomainEvent};
pub use command::{Command, CommandHandler, CommandResult, RetryConfig};
pub use error::DomainError;
pub use product::{
    AddInventory, CreateProduct, InventoryAddedData, InventoryRemovedData, InventoryService,
    Product, ProductCommand, ProductCreatedData, ProductError, ProductEvent, RemoveInventory,
};

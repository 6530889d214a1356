//! Product aggregate and related types.

mod aggregate;
mod commands;
mod events;
mod service;

pub use aggregate::Product;
pub use commands::{AddInventory, CreateProduct, ProductCommand, RemoveInventory};
pub use events::{InventoryAddedData, InventoryRemovedData, ProductCreatedData, ProductEvent};
pub use service::InventoryService;

use common::AggregateId;
use thiserror::Error;

/// Rejections produced by the product aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProductError {
    /// The command payload violates a business invariant.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Removal of more units than are in stock.
    #[error("Insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: u64, available: u64 },

    /// The product was never created.
    #[error("Product not found: {0}")]
    NotFound(AggregateId),

    /// The product was already created.
    #[error("Product already exists: {0}")]
    AlreadyExists(AggregateId),
}

impl ProductError {
    /// Short, stable label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ProductError::InvalidArgument(_) => "invalid_argument",
            ProductError::InsufficientStock { .. } => "insufficient_stock",
            ProductError::NotFound(_) => "not_found",
            ProductError::AlreadyExists(_) => "already_exists",
        }
    }
}

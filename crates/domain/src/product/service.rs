//! Inventory service: the inbound command boundary for products.

use common::AggregateId;
use event_store::{EventStore, Version};

use crate::command::{Command, CommandHandler, RetryConfig};
use crate::error::DomainError;

use super::{AddInventory, CreateProduct, Product, ProductCommand, RemoveInventory};

/// Service for managing product inventory.
///
/// Wraps the command handler for the [`Product`] aggregate and records
/// per-command metrics.
pub struct InventoryService<S: EventStore> {
    handler: CommandHandler<S, Product>,
}

impl<S: EventStore> InventoryService<S> {
    /// Creates a new inventory service with the default retry policy.
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store),
        }
    }

    /// Creates a new inventory service with an explicit retry policy.
    pub fn with_retry(store: S, retry: RetryConfig) -> Self {
        Self {
            handler: CommandHandler::with_retry(store, retry),
        }
    }

    /// Returns a reference to the underlying command handler.
    pub fn handler(&self) -> &CommandHandler<S, Product> {
        &self.handler
    }

    /// Dispatches a command to the product `product_id`.
    ///
    /// Returns the product's version after the command.
    #[tracing::instrument(skip(self))]
    pub async fn dispatch(
        &self,
        product_id: &AggregateId,
        command: ProductCommand,
    ) -> Result<Version, DomainError> {
        metrics::counter!("commands_dispatched_total", "command" => command.command_type())
            .increment(1);

        match self.handler.execute(product_id, command).await {
            Ok(result) => Ok(result.new_version),
            Err(e) => {
                metrics::counter!("commands_rejected_total", "reason" => e.reason()).increment(1);
                tracing::debug!(error = %e, "command failed");
                Err(e)
            }
        }
    }

    /// Creates a product under a freshly generated identifier.
    pub async fn create_product(
        &self,
        name: impl Into<String>,
        initial_quantity: i64,
    ) -> Result<(AggregateId, Version), DomainError> {
        let product_id = AggregateId::generate();
        let version = self
            .dispatch(&product_id, CreateProduct::new(name, initial_quantity).into())
            .await?;
        Ok((product_id, version))
    }

    /// Adds units to a product's stock.
    pub async fn add_inventory(
        &self,
        product_id: &AggregateId,
        quantity: i64,
    ) -> Result<Version, DomainError> {
        self.dispatch(product_id, AddInventory::new(quantity).into())
            .await
    }

    /// Takes units out of a product's stock.
    pub async fn remove_inventory(
        &self,
        product_id: &AggregateId,
        quantity: i64,
    ) -> Result<Version, DomainError> {
        self.dispatch(product_id, RemoveInventory::new(quantity).into())
            .await
    }

    /// Rebuilds a product from its events.
    ///
    /// Returns None if the product doesn't exist.
    #[tracing::instrument(skip(self))]
    pub async fn load_product(
        &self,
        product_id: &AggregateId,
    ) -> Result<Option<Product>, DomainError> {
        self.handler.load_existing(product_id).await
    }
}

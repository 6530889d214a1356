//! Product aggregate implementation.

use common::AggregateId;
use event_store::Version;

use crate::aggregate::Aggregate;

use super::{
    ProductCommand, ProductError, ProductEvent,
    events::{InventoryAddedData, InventoryRemovedData, ProductCreatedData},
};

/// Product aggregate root.
///
/// Tracks the stock level of one product. The state is never stored; it is
/// rebuilt from the product's events for every command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Product {
    /// Product identifier, set by `ProductCreated`.
    id: Option<AggregateId>,

    /// Current version for optimistic concurrency.
    version: Version,

    name: String,

    /// Units in stock.
    quantity: u64,
}

impl Aggregate for Product {
    type Event = ProductEvent;
    type Command = ProductCommand;
    type Error = ProductError;

    fn aggregate_type() -> &'static str {
        "Product"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id.clone()
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn handle(
        &self,
        aggregate_id: &AggregateId,
        command: ProductCommand,
    ) -> Result<Vec<ProductEvent>, ProductError> {
        match command {
            ProductCommand::Create(cmd) => {
                self.create(aggregate_id.clone(), &cmd.name, cmd.initial_quantity)
            }
            ProductCommand::AddInventory(cmd) => self.add_inventory(aggregate_id, cmd.quantity),
            ProductCommand::RemoveInventory(cmd) => {
                self.remove_inventory(aggregate_id, cmd.quantity)
            }
        }
    }

    fn apply(&mut self, event: ProductEvent) {
        match event {
            ProductEvent::ProductCreated(data) => self.apply_product_created(data),
            ProductEvent::InventoryAdded(data) => self.apply_inventory_added(data),
            ProductEvent::InventoryRemoved(data) => self.apply_inventory_removed(data),
        }
    }
}

// Query methods
impl Product {
    /// Returns the product name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the units in stock.
    pub fn quantity(&self) -> u64 {
        self.quantity
    }

    /// Returns true once the product has been created.
    pub fn exists(&self) -> bool {
        self.id.is_some()
    }
}

// Command methods (return events)
impl Product {
    /// Creates the product.
    pub fn create(
        &self,
        product_id: AggregateId,
        name: &str,
        initial_quantity: i64,
    ) -> Result<Vec<ProductEvent>, ProductError> {
        if product_id.is_blank() {
            return Err(ProductError::InvalidArgument(
                "product id must not be blank".to_string(),
            ));
        }
        if name.trim().is_empty() {
            return Err(ProductError::InvalidArgument(
                "name must not be blank".to_string(),
            ));
        }
        let Ok(initial_quantity) = u64::try_from(initial_quantity) else {
            return Err(ProductError::InvalidArgument(format!(
                "initial quantity must not be negative, got {initial_quantity}"
            )));
        };
        if let Some(id) = &self.id {
            return Err(ProductError::AlreadyExists(id.clone()));
        }

        Ok(vec![ProductEvent::product_created(
            product_id,
            name,
            initial_quantity,
        )])
    }

    /// Adds units to stock.
    pub fn add_inventory(
        &self,
        product_id: &AggregateId,
        quantity: i64,
    ) -> Result<Vec<ProductEvent>, ProductError> {
        let id = self.require_created(product_id)?;
        let quantity = positive(quantity)?;

        if self.quantity.checked_add(quantity).is_none() {
            return Err(ProductError::InvalidArgument(format!(
                "adding {quantity} units would overflow the stock level"
            )));
        }

        Ok(vec![ProductEvent::inventory_added(id.clone(), quantity)])
    }

    /// Takes units out of stock.
    pub fn remove_inventory(
        &self,
        product_id: &AggregateId,
        quantity: i64,
    ) -> Result<Vec<ProductEvent>, ProductError> {
        let id = self.require_created(product_id)?;
        let requested = positive(quantity)?;

        if self.quantity < requested {
            return Err(ProductError::InsufficientStock {
                requested,
                available: self.quantity,
            });
        }

        Ok(vec![ProductEvent::inventory_removed(id.clone(), requested)])
    }

    fn require_created(&self, product_id: &AggregateId) -> Result<&AggregateId, ProductError> {
        self.id
            .as_ref()
            .ok_or_else(|| ProductError::NotFound(product_id.clone()))
    }
}

fn positive(quantity: i64) -> Result<u64, ProductError> {
    match u64::try_from(quantity) {
        Ok(q) if q > 0 => Ok(q),
        _ => Err(ProductError::InvalidArgument(format!(
            "quantity must be positive, got {quantity}"
        ))),
    }
}

// Event application
impl Product {
    fn apply_product_created(&mut self, data: ProductCreatedData) {
        self.id = Some(data.product_id);
        self.name = data.name;
        self.quantity = data.initial_quantity;
    }

    fn apply_inventory_added(&mut self, data: InventoryAddedData) {
        self.quantity = self.quantity.saturating_add(data.quantity);
    }

    // Saturating keeps the fold total even for a history the aggregate
    // itself would never have produced.
    fn apply_inventory_removed(&mut self, data: InventoryRemovedData) {
        self.quantity = self.quantity.saturating_sub(data.quantity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::{AddInventory, CreateProduct, RemoveInventory};

    fn id() -> AggregateId {
        AggregateId::new("p-1")
    }

    fn created(quantity: u64) -> Product {
        let mut product = Product::default();
        product.apply(ProductEvent::product_created(id(), "Widget", quantity));
        product
    }

    #[test]
    fn test_create_product() {
        let product = Product::default();
        let events = product.create(id(), "Widget", 10).unwrap();

        assert_eq!(
            events,
            vec![ProductEvent::product_created(id(), "Widget", 10)]
        );
    }

    #[test]
    fn test_create_with_zero_quantity_is_allowed() {
        assert!(Product::default().create(id(), "Widget", 0).is_ok());
    }

    #[test]
    fn test_create_rejects_negative_quantity() {
        let result = Product::default().create(id(), "Widget", -1);
        assert!(matches!(result, Err(ProductError::InvalidArgument(_))));
    }

    #[test]
    fn test_create_rejects_blank_name() {
        let result = Product::default().create(id(), "   ", 1);
        assert!(matches!(result, Err(ProductError::InvalidArgument(_))));
    }

    #[test]
    fn test_create_rejects_blank_id() {
        let result = Product::default().create(AggregateId::new(""), "Widget", 1);
        assert!(matches!(result, Err(ProductError::InvalidArgument(_))));
    }

    #[test]
    fn test_create_twice_is_rejected() {
        let result = created(1).create(id(), "Widget", 1);
        assert_eq!(result, Err(ProductError::AlreadyExists(id())));
    }

    #[test]
    fn test_add_requires_positive_quantity() {
        let product = created(0);
        for quantity in [0, -5] {
            assert!(matches!(
                product.add_inventory(&id(), quantity),
                Err(ProductError::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn test_add_to_missing_product() {
        let result = Product::default().add_inventory(&id(), 5);
        assert_eq!(result, Err(ProductError::NotFound(id())));
    }

    #[test]
    fn test_add_rejects_overflow() {
        let mut product = created(0);
        product.apply(ProductEvent::inventory_added(id(), u64::MAX));

        let result = product.add_inventory(&id(), 1);
        assert!(matches!(result, Err(ProductError::InvalidArgument(_))));
    }

    #[test]
    fn test_remove_more_than_stock() {
        let product = created(3);
        let result = product.remove_inventory(&id(), 4);

        assert_eq!(
            result,
            Err(ProductError::InsufficientStock {
                requested: 4,
                available: 3
            })
        );
    }

    #[test]
    fn test_remove_entire_stock() {
        let product = created(3);
        let events = product.remove_inventory(&id(), 3).unwrap();
        assert_eq!(events, vec![ProductEvent::inventory_removed(id(), 3)]);
    }

    #[test]
    fn test_remove_from_missing_product() {
        let result = Product::default().remove_inventory(&id(), 1);
        assert_eq!(result, Err(ProductError::NotFound(id())));
    }

    #[test]
    fn test_handle_routes_commands() {
        let product = created(5);

        let events = product
            .handle(&id(), AddInventory::new(2).into())
            .unwrap();
        assert_eq!(events, vec![ProductEvent::inventory_added(id(), 2)]);

        let events = product
            .handle(&id(), RemoveInventory::new(5).into())
            .unwrap();
        assert_eq!(events, vec![ProductEvent::inventory_removed(id(), 5)]);

        let result = product.handle(&id(), CreateProduct::new("Widget", 1).into());
        assert!(matches!(result, Err(ProductError::AlreadyExists(_))));
    }

    #[test]
    fn test_fold_create_add_remove() {
        let mut product = Product::default();
        product.apply_events(vec![
            ProductEvent::product_created(id(), "Widget", 0),
            ProductEvent::inventory_added(id(), 5),
            ProductEvent::inventory_removed(id(), 3),
        ]);

        assert!(product.exists());
        assert_eq!(product.name(), "Widget");
        assert_eq!(product.quantity(), 2);
    }

    #[test]
    fn test_fold_is_deterministic() {
        let events = vec![
            ProductEvent::product_created(id(), "Widget", 10),
            ProductEvent::inventory_added(id(), 5),
            ProductEvent::inventory_removed(id(), 2),
            ProductEvent::inventory_added(id(), 7),
        ];

        let mut first = Product::default();
        first.apply_events(events.clone());
        let mut second = Product::default();
        second.apply_events(events);

        assert_eq!(first, second);
        assert_eq!(first.quantity(), 20);
    }

    #[test]
    fn test_fold_never_goes_negative() {
        let mut product = created(1);
        product.apply(ProductEvent::inventory_removed(id(), 10));
        assert_eq!(product.quantity(), 0);
    }
}

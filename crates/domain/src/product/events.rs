//! Product domain events.

use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

/// Events that can occur on a product aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ProductEvent {
    /// Product was created with an initial stock level.
    ProductCreated(ProductCreatedData),

    /// Units were added to stock.
    InventoryAdded(InventoryAddedData),

    /// Units were taken out of stock.
    InventoryRemoved(InventoryRemovedData),
}

impl DomainEvent for ProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::ProductCreated(_) => "ProductCreated",
            ProductEvent::InventoryAdded(_) => "InventoryAdded",
            ProductEvent::InventoryRemoved(_) => "InventoryRemoved",
        }
    }
}

impl ProductEvent {
    /// Creates a ProductCreated event.
    pub fn product_created(
        product_id: AggregateId,
        name: impl Into<String>,
        initial_quantity: u64,
    ) -> Self {
        ProductEvent::ProductCreated(ProductCreatedData {
            product_id,
            name: name.into(),
            initial_quantity,
        })
    }

    /// Creates an InventoryAdded event.
    pub fn inventory_added(product_id: AggregateId, quantity: u64) -> Self {
        ProductEvent::InventoryAdded(InventoryAddedData {
            product_id,
            quantity,
        })
    }

    /// Creates an InventoryRemoved event.
    pub fn inventory_removed(product_id: AggregateId, quantity: u64) -> Self {
        ProductEvent::InventoryRemoved(InventoryRemovedData {
            product_id,
            quantity,
        })
    }

    /// Returns the product this event belongs to.
    pub fn product_id(&self) -> &AggregateId {
        match self {
            ProductEvent::ProductCreated(data) => &data.product_id,
            ProductEvent::InventoryAdded(data) => &data.product_id,
            ProductEvent::InventoryRemoved(data) => &data.product_id,
        }
    }
}

/// Data for ProductCreated event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCreatedData {
    pub product_id: AggregateId,
    pub name: String,
    pub initial_quantity: u64,
}

/// Data for InventoryAdded event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryAddedData {
    pub product_id: AggregateId,
    pub quantity: u64,
}

/// Data for InventoryRemoved event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRemovedData {
    pub product_id: AggregateId,
    pub quantity: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type() {
        let id = AggregateId::new("p-1");

        let event = ProductEvent::product_created(id.clone(), "Widget", 10);
        assert_eq!(event.event_type(), "ProductCreated");

        let event = ProductEvent::inventory_added(id.clone(), 5);
        assert_eq!(event.event_type(), "InventoryAdded");

        let event = ProductEvent::inventory_removed(id, 3);
        assert_eq!(event.event_type(), "InventoryRemoved");
    }

    #[test]
    fn test_wire_format_is_tagged() {
        let event = ProductEvent::inventory_added(AggregateId::new("p-1"), 5);

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "InventoryAdded",
                "data": { "product_id": "p-1", "quantity": 5 }
            })
        );

        let decoded: ProductEvent = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, event);
        assert_eq!(decoded.product_id().as_str(), "p-1");
    }

    #[test]
    fn test_unknown_tag_is_rejected() {
        let json = serde_json::json!({ "type": "PriceChanged", "data": {} });
        assert!(serde_json::from_value::<ProductEvent>(json).is_err());
    }
}

//! Product projection: keeps one [`ProductView`] per product.

use async_trait::async_trait;
use domain::{Aggregate, Product, ProductEvent};
use event_store::EventEnvelope;

use crate::projection::{Outcome, Projection};
use crate::read_model::{ProductReadModel, ProductView};
use crate::{ProjectionError, Result};

/// Projects product events into a [`ProductReadModel`].
///
/// Each view carries the version of the last event applied to it. An event
/// is applied only if it is the next one for its product; older events are
/// duplicates and newer ones are reported as a gap.
#[derive(Clone)]
pub struct ProductProjection<R: ProductReadModel> {
    store: R,
}

impl<R: ProductReadModel> ProductProjection<R> {
    /// Creates a projection writing into `store`.
    pub fn new(store: R) -> Self {
        Self { store }
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &R {
        &self.store
    }
}

#[async_trait]
impl<R: ProductReadModel> Projection for ProductProjection<R> {
    fn name(&self) -> &'static str {
        "ProductProjection"
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<Outcome> {
        if event.aggregate_type != Product::aggregate_type() {
            return Ok(Outcome::Ignored);
        }

        let current = self.store.get(&event.aggregate_id).await?;
        let watermark = current.as_ref().map(|v| v.version).unwrap_or_default();

        if event.version <= watermark {
            return Ok(Outcome::Duplicate);
        }

        let expected = watermark.next();
        let gap = || ProjectionError::Gap {
            aggregate_id: event.aggregate_id.clone(),
            expected,
            found: event.version,
        };
        if event.version != expected {
            return Err(gap());
        }

        let view = match (event.decode::<ProductEvent>()?, current) {
            (ProductEvent::ProductCreated(data), _) => ProductView {
                product_id: event.aggregate_id.clone(),
                name: data.name,
                quantity: data.initial_quantity,
                version: event.version,
            },
            (ProductEvent::InventoryAdded(data), Some(mut view)) => {
                view.quantity = view.quantity.saturating_add(data.quantity);
                view.version = event.version;
                view
            }
            (ProductEvent::InventoryRemoved(data), Some(mut view)) => {
                view.quantity = view.quantity.saturating_sub(data.quantity);
                view.version = event.version;
                view
            }
            // A change to a product that has no view yet.
            (_, None) => return Err(gap()),
        };

        self.store.save(view).await?;
        Ok(Outcome::Applied)
    }

    async fn reset(&self) -> Result<()> {
        self.store.clear().await
    }
}

//! Query side entry point.

use common::AggregateId;

use crate::read_model::{ProductReadModel, ProductView};

/// Read-only access to product views.
///
/// Queries never fail: a store error is logged and answered as "not found"
/// (or an empty list). A product whose events have not been projected yet is
/// likewise not found.
#[derive(Clone)]
pub struct ProductQueries<R: ProductReadModel> {
    store: R,
}

impl<R: ProductReadModel> ProductQueries<R> {
    /// Creates queries over `store`.
    pub fn new(store: R) -> Self {
        Self { store }
    }

    /// Looks up one product.
    #[tracing::instrument(skip(self))]
    pub async fn get_by_id(&self, product_id: &AggregateId) -> Option<ProductView> {
        match self.store.get(product_id).await {
            Ok(view) => view,
            Err(e) => {
                tracing::warn!(error = %e, "read model lookup failed");
                None
            }
        }
    }

    /// Lists all products ordered by id.
    #[tracing::instrument(skip(self))]
    pub async fn list_all(&self) -> Vec<ProductView> {
        match self.store.list().await {
            Ok(views) => views,
            Err(e) => {
                tracing::warn!(error = %e, "read model listing failed");
                Vec::new()
            }
        }
    }
}

//! Product read model: the entity, the store trait and an in-memory store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::AggregateId;
use event_store::Version;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::Result;

/// Denormalized view of one product, as served to queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductView {
    pub product_id: AggregateId,
    pub name: String,
    pub quantity: u64,

    /// Version of the last event applied to this view.
    pub version: Version,
}

/// Storage for product views.
///
/// Written only by the product projection; read by [`ProductQueries`](crate::ProductQueries).
#[async_trait]
pub trait ProductReadModel: Send + Sync {
    /// Returns the view for `product_id`, if one exists.
    async fn get(&self, product_id: &AggregateId) -> Result<Option<ProductView>>;

    /// Returns all views ordered by product id.
    async fn list(&self) -> Result<Vec<ProductView>>;

    /// Inserts the view, replacing any existing view with the same product id.
    async fn save(&self, view: ProductView) -> Result<()>;

    /// Removes every view.
    async fn clear(&self) -> Result<()>;
}

/// In-memory product view store.
///
/// Cloning is cheap and clones share the same views.
#[derive(Clone, Default)]
pub struct InMemoryProductStore {
    views: Arc<RwLock<HashMap<AggregateId, ProductView>>>,
}

impl InMemoryProductStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored views.
    pub async fn len(&self) -> usize {
        self.views.read().await.len()
    }

    /// Returns true if no view is stored.
    pub async fn is_empty(&self) -> bool {
        self.views.read().await.is_empty()
    }
}

#[async_trait]
impl ProductReadModel for InMemoryProductStore {
    async fn get(&self, product_id: &AggregateId) -> Result<Option<ProductView>> {
        Ok(self.views.read().await.get(product_id).cloned())
    }

    async fn list(&self) -> Result<Vec<ProductView>> {
        let mut views: Vec<_> = self.views.read().await.values().cloned().collect();
        views.sort_by(|a, b| a.product_id.cmp(&b.product_id));
        Ok(views)
    }

    async fn save(&self, view: ProductView) -> Result<()> {
        self.views
            .write()
            .await
            .insert(view.product_id.clone(), view);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.views.write().await.clear();
        Ok(())
    }
}

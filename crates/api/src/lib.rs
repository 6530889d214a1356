//! HTTP API server with observability for the inventory engine.
//!
//! Provides REST endpoints for product commands and read-model queries,
//! with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use domain::InventoryService;
use event_store::EventStore;
use metrics_exporter_prometheus::PrometheusHandle;
use projections::{
    InMemoryProductStore, ProductProjection, ProductQueries, ProjectionSynchronizer,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;

/// Event store shared by the command side and the synchronizer.
pub type SharedEventStore = Arc<dyn EventStore>;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub service: InventoryService<SharedEventStore>,
    pub queries: ProductQueries<InMemoryProductStore>,
    pub event_store: SharedEventStore,
    pub synchronizer: Arc<ProjectionSynchronizer<SharedEventStore>>,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/api/products",
            post(routes::products::create).get(routes::products::list),
        )
        .route("/api/products/{id}", get(routes::products::get))
        .route(
            "/api/products/{id}/add-inventory",
            post(routes::products::add_inventory),
        )
        .route(
            "/api/products/{id}/remove-inventory",
            post(routes::products::remove_inventory),
        )
        .route("/api/products/{id}/events", get(routes::products::events))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state over `event_store`.
///
/// The returned synchronizer is not running; the caller spawns
/// [`ProjectionSynchronizer::run`] or drives it with `run_catch_up`.
pub fn create_default_state(event_store: SharedEventStore, config: &Config) -> Arc<AppState> {
    let service = InventoryService::with_retry(event_store.clone(), config.retry());

    let views = InMemoryProductStore::new();
    let mut synchronizer =
        ProjectionSynchronizer::with_config(event_store.clone(), config.synchronizer());
    synchronizer.register(Box::new(ProductProjection::new(views.clone())));

    Arc::new(AppState {
        service,
        queries: ProductQueries::new(views),
        event_store,
        synchronizer: Arc::new(synchronizer),
    })
}

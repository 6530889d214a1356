//! Product command and query endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::AggregateId;
use domain::{AddInventory, ProductCommand, RemoveInventory};
use event_store::EventStore;
use projections::ProductView;
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    #[serde(alias = "initialQuantity")]
    pub initial_quantity: i64,
}

#[derive(Deserialize)]
pub struct UpdateInventoryRequest {
    pub quantity: i64,
}

// -- Response types --

#[derive(Serialize)]
pub struct CommandAcceptedResponse {
    pub product_id: String,
    pub version: i64,
}

/// Response type for event envelope data.
#[derive(Serialize)]
pub struct EventEnvelopeResponse {
    pub event_id: String,
    pub event_type: String,
    pub aggregate_id: String,
    pub version: i64,
    pub timestamp: String,
    pub payload: serde_json::Value,
}

// -- Handlers --

/// POST /api/products: create a product under a new identifier.
#[tracing::instrument(skip(state, req))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<CommandAcceptedResponse>), ApiError> {
    let (product_id, version) = state
        .service
        .create_product(req.name, req.initial_quantity)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CommandAcceptedResponse {
            product_id: product_id.to_string(),
            version: version.as_i64(),
        }),
    ))
}

/// POST /api/products/{id}/add-inventory
#[tracing::instrument(skip(state, req))]
pub async fn add_inventory(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateInventoryRequest>,
) -> Result<Json<CommandAcceptedResponse>, ApiError> {
    dispatch(&state, id, AddInventory::new(req.quantity).into()).await
}

/// POST /api/products/{id}/remove-inventory
#[tracing::instrument(skip(state, req))]
pub async fn remove_inventory(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateInventoryRequest>,
) -> Result<Json<CommandAcceptedResponse>, ApiError> {
    dispatch(&state, id, RemoveInventory::new(req.quantity).into()).await
}

/// GET /api/products: list all products from the read model.
///
/// The read model is eventually consistent: a product appears once the
/// synchronizer has applied its events.
#[tracing::instrument(skip(state))]
pub async fn list(State(state): State<Arc<AppState>>) -> Json<Vec<ProductView>> {
    Json(state.queries.list_all().await)
}

/// GET /api/products/{id}: one product from the read model.
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ProductView>, ApiError> {
    state
        .queries
        .get_by_id(&AggregateId::new(id.as_str()))
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Product {id} not found")))
}

/// GET /api/products/{id}/events: the product's event history.
#[tracing::instrument(skip(state))]
pub async fn events(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<EventEnvelopeResponse>>, ApiError> {
    let history = state
        .event_store
        .read_stream(&AggregateId::new(id.as_str()))
        .await?;

    if history.is_empty() {
        return Err(ApiError::NotFound(format!("Product {id} not found")));
    }

    let responses = history
        .events
        .into_iter()
        .map(|e| EventEnvelopeResponse {
            event_id: e.event_id.to_string(),
            event_type: e.event_type,
            aggregate_id: e.aggregate_id.to_string(),
            version: e.version.as_i64(),
            timestamp: e.timestamp.to_rfc3339(),
            payload: e.payload,
        })
        .collect();

    Ok(Json(responses))
}

async fn dispatch(
    state: &AppState,
    id: String,
    command: ProductCommand,
) -> Result<Json<CommandAcceptedResponse>, ApiError> {
    let product_id = AggregateId::new(id);
    let version = state.service.dispatch(&product_id, command).await?;

    Ok(Json(CommandAcceptedResponse {
        product_id: product_id.to_string(),
        version: version.as_i64(),
    }))
}

//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Events the synchronizer has consumed from the global feed.
    pub events_processed: u64,
    /// Out-of-order events waiting for their predecessors.
    pub pending_events: usize,
    /// Malformed events the synchronizer set aside.
    pub rejected_events: usize,
}

/// GET /health: liveness plus projection progress.
///
/// Reads the last published progress, so it answers while a
/// synchronization pass is running.
pub async fn check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let progress = state.synchronizer.progress();
    Json(HealthResponse {
        status: "ok",
        events_processed: progress.position.events_processed,
        pending_events: progress.pending,
        rejected_events: progress.rejected,
    })
}

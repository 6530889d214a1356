//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{DomainError, ProductError};
use event_store::EventStoreError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Resource not found.
    #[error("{0}")]
    NotFound(String),

    /// Command rejected or failed in the domain layer.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Reading the event log failed.
    #[error(transparent)]
    EventStore(#[from] EventStoreError),
}

impl ApiError {
    /// Returns the HTTP status this error is reported with.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Domain(err) => domain_status(err),
            ApiError::EventStore(err) => store_status(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, %status, "request failed");
        }

        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

fn domain_status(err: &DomainError) -> StatusCode {
    match err {
        DomainError::Product(product_err) => match product_err {
            ProductError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            ProductError::InsufficientStock { .. } => StatusCode::CONFLICT,
            ProductError::NotFound(_) => StatusCode::NOT_FOUND,
            ProductError::AlreadyExists(_) => StatusCode::CONFLICT,
        },
        DomainError::ConcurrencyExhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
        DomainError::EventStore(store_err) => store_status(store_err),
        DomainError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn store_status(err: &EventStoreError) -> StatusCode {
    match err {
        EventStoreError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

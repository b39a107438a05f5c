//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::DomainError;
use saga::SagaError;
use store::StoreError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Saga/domain error.
    Saga(SagaError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Saga(err) => saga_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn saga_error_to_response(err: SagaError) -> (StatusCode, String) {
    match &err {
        SagaError::OrderNotFound(_)
        | SagaError::OrderNumberNotFound(_)
        | SagaError::PaymentNotFound(_)
        | SagaError::ShipmentNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),

        SagaError::NoLines
        | SagaError::UnknownProduct { .. }
        | SagaError::InsufficientStock { .. }
        | SagaError::PriceMismatch { .. }
        | SagaError::VoucherInvalid { .. }
        | SagaError::DiscountMismatch { .. } => (StatusCode::BAD_REQUEST, err.to_string()),

        SagaError::PaymentRequired(_)
        | SagaError::PaymentNotRetryable { .. }
        | SagaError::CancelForbidden { .. }
        | SagaError::ShipmentNotDispatched(_)
        | SagaError::Domain(DomainError::InvalidTransition { .. })
        | SagaError::Domain(DomainError::TerminalStatus { .. })
        | SagaError::Domain(DomainError::RefundWindowExpired { .. })
        | SagaError::Domain(DomainError::RefundNotPaid { .. })
        | SagaError::Store(StoreError::VersionConflict { .. })
        | SagaError::Store(StoreError::Duplicate { .. }) => {
            (StatusCode::CONFLICT, err.to_string())
        }

        SagaError::Gateway(_) | SagaError::Carrier(_) => {
            tracing::error!(error = %err, "downstream adapter failure");
            (StatusCode::BAD_GATEWAY, err.to_string())
        }

        _ => {
            tracing::error!(error = %err, "saga failure");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

impl From<SagaError> for ApiError {
    fn from(err: SagaError) -> Self {
        ApiError::Saga(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Saga(SagaError::Store(err))
    }
}

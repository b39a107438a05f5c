//! Saga error types.

use carrier::CarrierError;
use common::{Money, OrderId};
use domain::{DomainError, PaymentStatus};
use gateway::GatewayError;
use store::StoreError;
use thiserror::Error;

/// Errors that can occur during saga operations.
#[derive(Debug, Error)]
pub enum SagaError {
    /// Order not found.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// Order not found by its human-readable number.
    #[error("Order not found: {0}")]
    OrderNumberNotFound(String),

    /// No payment exists for the order.
    #[error("No payment for order {0}")]
    PaymentNotFound(OrderId),

    /// No shipment exists for the order.
    #[error("No shipment for order {0}")]
    ShipmentNotFound(OrderId),

    /// Order has no line items.
    #[error("Order has no line items")]
    NoLines,

    /// The shipment exists but has not been dispatched to the carrier yet.
    #[error("Shipment for order {0} has no carrier order yet")]
    ShipmentNotDispatched(OrderId),

    /// A line item referenced an unknown product.
    #[error("Unknown product: {sku}")]
    UnknownProduct { sku: String },

    /// Not enough stock to satisfy a line item.
    #[error("Insufficient stock for {sku}: requested {requested}, available {available}")]
    InsufficientStock {
        sku: String,
        requested: u32,
        available: u32,
    },

    /// The submitted unit price drifted from the catalog price.
    #[error("Price mismatch for {sku}: catalog {expected}, submitted {submitted}")]
    PriceMismatch {
        sku: String,
        expected: Money,
        submitted: Money,
    },

    /// The voucher could not be applied.
    #[error("Voucher {code} rejected: {reason}")]
    VoucherInvalid { code: String, reason: String },

    /// The caller's claimed discount does not match the recomputed one.
    #[error("Discount mismatch: computed {computed}, claimed {claimed}")]
    DiscountMismatch { computed: Money, claimed: Money },

    /// Processing requires a settled payment (or COD).
    #[error("Order {0} cannot enter Processing: payment not settled")]
    PaymentRequired(OrderId),

    /// The latest payment is not eligible for retry.
    #[error("Payment in {status} status is not eligible for retry")]
    PaymentNotRetryable { status: PaymentStatus },

    /// Cancellation is forbidden by policy.
    #[error("Order cannot be cancelled: {reason}")]
    CancelForbidden { reason: String },

    /// Domain rule violation (illegal transition, terminal state, ...).
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Store error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Gateway adapter error.
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Carrier adapter error.
    #[error("Carrier error: {0}")]
    Carrier(#[from] CarrierError),

    /// Collaborator service failure (catalog, voucher, notification).
    #[error("{service} service error: {message}")]
    Collaborator {
        service: &'static str,
        message: String,
    },
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;

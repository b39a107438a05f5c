//! Domain error types.

use thiserror::Error;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The requested status transition is not in the allowed-transition table.
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// The record is in a terminal status and can no longer change.
    #[error("Status {status} is terminal")]
    TerminalStatus { status: String },

    /// A monetary field would go negative.
    #[error("Amount for {field} must not be negative: {cents}")]
    NegativeAmount { field: &'static str, cents: i64 },

    /// Refund requested outside the eligibility window.
    #[error("Refund window of {window_days} days has expired")]
    RefundWindowExpired { window_days: i64 },

    /// Refund requested on a payment that was never paid.
    #[error("Cannot refund a payment in {status} status")]
    RefundNotPaid { status: String },

    /// A persisted value could not be interpreted.
    #[error("Unknown {kind} value: {value}")]
    UnknownValue { kind: &'static str, value: String },
}

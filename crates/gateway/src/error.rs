use thiserror::Error;

/// Errors raised while interpreting gateway callbacks.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// A required callback field was absent.
    #[error("Missing callback field: {0}")]
    MissingField(&'static str),

    /// The amount field was not a valid scaled integer.
    #[error("Invalid callback amount: {0}")]
    InvalidAmount(String),

    /// The pay-date field did not match the gateway's `yyyyMMddHHmmss` format.
    #[error("Invalid callback pay date: {0}")]
    InvalidPayDate(String),
}

use thiserror::Error;

/// Errors raised by the carrier adapter.
#[derive(Debug, Error)]
pub enum CarrierError {
    /// Transport-level failure (connect, timeout, TLS, decode).
    #[error("Carrier transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// The carrier API returned a non-success envelope code.
    #[error("Carrier API error {code}: {message}")]
    Api { code: i64, message: String },

    /// The carrier envelope was missing its data payload.
    #[error("Carrier response missing data for {0}")]
    MissingData(&'static str),

    /// An address component could not be resolved against the hierarchy.
    #[error("Unknown {level}: {name}")]
    AddressNotFound { level: &'static str, name: String },

    /// The carrier does not know the referenced order.
    #[error("Carrier order not found: {0}")]
    OrderNotFound(String),
}

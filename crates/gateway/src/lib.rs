//! Payment gateway adapter.
//!
//! Builds and verifies the gateway's HMAC-SHA512 parameter signatures, signs
//! outbound payment-initiation URLs, and parses inbound IPN callbacks into a
//! typed result. Pure protocol plumbing: no storage, no HTTP client (the
//! gateway flow is redirect-based).

pub mod client;
pub mod error;
pub mod signing;
pub mod types;

pub use client::VnpayGateway;
pub use error::GatewayError;
pub use signing::{canonicalize, sign, verify};
pub use types::{PaymentCallback, SignatureCheck, VnpayConfig};

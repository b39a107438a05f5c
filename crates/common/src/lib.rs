//! Shared types used across the fulfillment workspace.

mod types;

pub use types::{Money, OrderId, PaymentId, ShipmentId};

//! CRUD + state-transition services over the three records.

pub mod order;
pub mod payment;
pub mod shipping;

pub use order::OrderLedger;
pub use payment::{PAYMENT_STALENESS_MINUTES, PaymentLedger};
pub use shipping::ShipmentLedger;

/// Bounded retries for optimistic-concurrency conflicts on webhook-applied
/// updates. Every retry recomputes the target state from a fresh read, so
/// duplicate deliveries converge instead of racing.
pub(crate) const VERSION_RETRY_ATTEMPTS: u32 = 3;

//! Order fulfillment saga.
//!
//! The orchestrator turns a submitted order into a paid, shipped, trackable
//! transaction by coordinating the relational ledgers, the payment gateway,
//! and the shipping carrier:
//! 1. Validate lines and voucher, quote the shipping fee.
//! 2. Commit order + initial payment + shipment intent atomically.
//! 3. Create the carrier shipment outside that transaction; a failure leaves
//!    the intent pending for the retry sweep instead of rolling back.
//! 4. Reconcile state from synchronous calls and at-least-once webhooks.

pub mod error;
pub mod ledgers;
pub mod orchestrator;
pub mod services;
pub mod sweep;
pub mod types;

pub use error::SagaError;
pub use ledgers::{OrderLedger, PaymentLedger, ShipmentLedger};
pub use orchestrator::Orchestrator;
pub use services::{
    CatalogService, InMemoryCatalogService, InMemoryNotificationService, InMemoryVoucherService,
    NotificationService, ProductInfo, VoucherService,
};
pub use sweep::{MAX_SHIPMENT_ATTEMPTS, ShipmentSweepStats};
pub use types::{
    CallbackOutcome, CreateOrderInput, CreateOrderOutcome, OrderLineInput, PaymentStatusView,
    ShipmentOutcome, VoucherClaim,
};

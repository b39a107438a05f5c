//! Domain records and state machines for the order fulfillment saga.
//!
//! Each record (Order, Payment, Shipping) carries its status enum and the
//! allowed-transition table; all persistence lives in the `store` crate.

pub mod error;
pub mod order;
pub mod payment;
pub mod shipping;

pub use error::DomainError;
pub use order::{Order, OrderLine, OrderStatus, generate_order_number};
pub use payment::{PAYMENT_REFUND_WINDOW_DAYS, Payment, PaymentMethod, PaymentStatus};
pub use shipping::{
    IntentStatus, Recipient, ShipmentIntent, Shipping, ShippingStatus,
};

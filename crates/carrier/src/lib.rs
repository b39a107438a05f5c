//! Shipping carrier adapter.
//!
//! Wraps the carrier's order-creation, fee, tracking, and address-hierarchy
//! APIs behind the `CarrierApi` trait, with a reqwest-backed client for
//! production and an in-memory mock for tests. Carrier status strings are
//! decoded into a closed enum at the boundary and mapped to the internal
//! shipping status vocabulary.

pub mod cache;
pub mod client;
pub mod error;
pub mod status;
pub mod types;

pub use cache::TtlCache;
pub use client::{CarrierApi, GhnClient, MockCarrier};
pub use error::CarrierError;
pub use status::CarrierStatus;
pub use types::{
    CarrierItem, CreateOrderRequest, CreatedOrder, District, FeeQuote, FeeRequest, GhnConfig,
    Province, Ward, DEFAULT_ITEM_WEIGHT_GRAMS,
};

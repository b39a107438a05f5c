//! Persistence layer for the fulfillment system.
//!
//! Defines repository traits over the Order, Payment, Shipping,
//! ShipmentIntent, and WebhookEvent records, with an in-memory
//! implementation for tests and a PostgreSQL implementation for production.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod repository;
pub mod webhook;

pub use error::StoreError;
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use repository::{
    FulfillmentStore, OrderStore, PaymentStore, ShipmentIntentStore, ShipmentStore,
    WebhookEventStore,
};
pub use webhook::{WebhookEventFilter, WebhookEventRecord, WebhookSource};

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

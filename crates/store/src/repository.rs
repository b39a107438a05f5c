//! Repository traits for the fulfillment ledgers.
//!
//! All implementations must be thread-safe (Send + Sync). Payment and
//! shipment updates use optimistic concurrency: the record's `version` field
//! is the expected stored version, the write bumps it by one, and a mismatch
//! fails with `StoreError::VersionConflict`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{OrderId, PaymentId};
use domain::{Order, Payment, ShipmentIntent, Shipping};
use uuid::Uuid;

use crate::Result;
use crate::webhook::{WebhookEventFilter, WebhookEventRecord};

/// Order persistence.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Atomically persists a new order with its initial payment and shipment
    /// intent. This is the saga's transaction boundary — either all three
    /// records exist afterwards or none do.
    async fn create_order(
        &self,
        order: &Order,
        payment: &Payment,
        intent: &ShipmentIntent,
    ) -> Result<()>;

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    async fn get_order_by_number(&self, order_number: &str) -> Result<Option<Order>>;

    /// Persists mutated order fields. Line items are immutable and ignored.
    async fn update_order(&self, order: &Order) -> Result<()>;
}

/// Payment persistence.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn insert_payment(&self, payment: &Payment) -> Result<()>;

    async fn get_payment(&self, id: PaymentId) -> Result<Option<Payment>>;

    /// The most recently created payment for an order.
    async fn latest_payment_for_order(&self, order_id: OrderId) -> Result<Option<Payment>>;

    /// The single active (Unpaid/Pending) payment for an order, if any.
    async fn active_payment_for_order(&self, order_id: OrderId) -> Result<Option<Payment>>;

    /// Optimistic write: `payment.version` is the expected stored version.
    /// Returns the stored record with the bumped version.
    async fn update_payment(&self, payment: &Payment) -> Result<Payment>;

    /// Payments still Pending that were created before `cutoff`.
    async fn stale_pending_payments(&self, cutoff: DateTime<Utc>) -> Result<Vec<Payment>>;
}

/// Shipment persistence.
#[async_trait]
pub trait ShipmentStore: Send + Sync {
    async fn insert_shipment(&self, shipping: &Shipping) -> Result<()>;

    async fn get_shipment_for_order(&self, order_id: OrderId) -> Result<Option<Shipping>>;

    async fn get_shipment_by_carrier_code(&self, carrier_order_code: &str)
    -> Result<Option<Shipping>>;

    /// Optimistic write: `shipping.version` is the expected stored version.
    /// Returns the stored record with the bumped version.
    async fn update_shipment(&self, shipping: &Shipping) -> Result<Shipping>;
}

/// Shipment-intent (outbox) persistence.
#[async_trait]
pub trait ShipmentIntentStore: Send + Sync {
    async fn get_intent(&self, id: Uuid) -> Result<Option<ShipmentIntent>>;

    async fn get_intent_for_order(&self, order_id: OrderId) -> Result<Option<ShipmentIntent>>;

    async fn update_intent(&self, intent: &ShipmentIntent) -> Result<()>;

    /// Pending intents, oldest first, for the retry sweep.
    async fn pending_intents(&self, limit: i64) -> Result<Vec<ShipmentIntent>>;
}

/// Durable webhook audit persistence.
#[async_trait]
pub trait WebhookEventStore: Send + Sync {
    async fn insert_webhook_event(&self, record: &WebhookEventRecord) -> Result<()>;

    /// Lists events newest-first, honoring the filter's pagination.
    async fn list_webhook_events(
        &self,
        filter: &WebhookEventFilter,
    ) -> Result<Vec<WebhookEventRecord>>;

    async fn count_webhook_events(&self, filter: &WebhookEventFilter) -> Result<i64>;

    /// Deletes events received strictly before `cutoff`; returns the count.
    async fn delete_webhook_events_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

/// The full persistence surface the saga and monitoring run against.
pub trait FulfillmentStore:
    OrderStore + PaymentStore + ShipmentStore + ShipmentIntentStore + WebhookEventStore
{
}

impl<T> FulfillmentStore for T where
    T: OrderStore + PaymentStore + ShipmentStore + ShipmentIntentStore + WebhookEventStore
{
}

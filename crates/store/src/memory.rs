//! In-memory store implementation for tests and local development.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{OrderId, PaymentId, ShipmentId};
use domain::{Order, Payment, PaymentStatus, ShipmentIntent, Shipping};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::Result;
use crate::error::StoreError;
use crate::repository::{
    OrderStore, PaymentStore, ShipmentIntentStore, ShipmentStore, WebhookEventStore,
};
use crate::webhook::{WebhookEventFilter, WebhookEventRecord};

#[derive(Default)]
struct Inner {
    orders: HashMap<OrderId, Order>,
    order_numbers: HashMap<String, OrderId>,
    payments: HashMap<PaymentId, Payment>,
    shipments: HashMap<ShipmentId, Shipping>,
    intents: HashMap<Uuid, ShipmentIntent>,
    webhook_events: Vec<WebhookEventRecord>,
}

/// In-memory store providing the same interface as the PostgreSQL
/// implementation.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of persisted orders.
    pub async fn order_count(&self) -> usize {
        self.inner.read().await.orders.len()
    }

    /// Returns the number of persisted webhook events.
    pub async fn webhook_event_count(&self) -> usize {
        self.inner.read().await.webhook_events.len()
    }

    /// Clears all records.
    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        *inner = Inner::default();
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn create_order(
        &self,
        order: &Order,
        payment: &Payment,
        intent: &ShipmentIntent,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;

        if inner.order_numbers.contains_key(&order.order_number) {
            return Err(StoreError::Duplicate {
                entity: "order",
                key: order.order_number.clone(),
            });
        }

        inner
            .order_numbers
            .insert(order.order_number.clone(), order.id);
        inner.orders.insert(order.id, order.clone());
        inner.payments.insert(payment.id, payment.clone());
        inner.intents.insert(intent.id, intent.clone());
        Ok(())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.inner.read().await.orders.get(&id).cloned())
    }

    async fn get_order_by_number(&self, order_number: &str) -> Result<Option<Order>> {
        let inner = self.inner.read().await;
        Ok(inner
            .order_numbers
            .get(order_number)
            .and_then(|id| inner.orders.get(id))
            .cloned())
    }

    async fn update_order(&self, order: &Order) -> Result<()> {
        let mut inner = self.inner.write().await;
        if !inner.orders.contains_key(&order.id) {
            return Err(StoreError::NotFound {
                entity: "order",
                key: order.id.to_string(),
            });
        }
        inner.orders.insert(order.id, order.clone());
        Ok(())
    }
}

#[async_trait]
impl PaymentStore for InMemoryStore {
    async fn insert_payment(&self, payment: &Payment) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.payments.insert(payment.id, payment.clone());
        Ok(())
    }

    async fn get_payment(&self, id: PaymentId) -> Result<Option<Payment>> {
        Ok(self.inner.read().await.payments.get(&id).cloned())
    }

    async fn latest_payment_for_order(&self, order_id: OrderId) -> Result<Option<Payment>> {
        let inner = self.inner.read().await;
        Ok(inner
            .payments
            .values()
            .filter(|p| p.order_id == order_id)
            .max_by_key(|p| p.created_at)
            .cloned())
    }

    async fn active_payment_for_order(&self, order_id: OrderId) -> Result<Option<Payment>> {
        let inner = self.inner.read().await;
        Ok(inner
            .payments
            .values()
            .filter(|p| p.order_id == order_id && p.status.is_active())
            .max_by_key(|p| p.created_at)
            .cloned())
    }

    async fn update_payment(&self, payment: &Payment) -> Result<Payment> {
        let mut inner = self.inner.write().await;
        let stored = inner
            .payments
            .get_mut(&payment.id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "payment",
                key: payment.id.to_string(),
            })?;

        if stored.version != payment.version {
            return Err(StoreError::VersionConflict {
                entity: "payment",
                key: payment.id.to_string(),
                expected: payment.version,
            });
        }

        let mut updated = payment.clone();
        updated.version += 1;
        *stored = updated.clone();
        Ok(updated)
    }

    async fn stale_pending_payments(&self, cutoff: DateTime<Utc>) -> Result<Vec<Payment>> {
        let inner = self.inner.read().await;
        let mut stale: Vec<Payment> = inner
            .payments
            .values()
            .filter(|p| p.status == PaymentStatus::Pending && p.created_at < cutoff)
            .cloned()
            .collect();
        stale.sort_by_key(|p| p.created_at);
        Ok(stale)
    }
}

#[async_trait]
impl ShipmentStore for InMemoryStore {
    async fn insert_shipment(&self, shipping: &Shipping) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner
            .shipments
            .values()
            .any(|s| s.order_id == shipping.order_id)
        {
            return Err(StoreError::Duplicate {
                entity: "shipment",
                key: shipping.order_id.to_string(),
            });
        }
        inner.shipments.insert(shipping.id, shipping.clone());
        Ok(())
    }

    async fn get_shipment_for_order(&self, order_id: OrderId) -> Result<Option<Shipping>> {
        let inner = self.inner.read().await;
        Ok(inner
            .shipments
            .values()
            .find(|s| s.order_id == order_id)
            .cloned())
    }

    async fn get_shipment_by_carrier_code(
        &self,
        carrier_order_code: &str,
    ) -> Result<Option<Shipping>> {
        let inner = self.inner.read().await;
        Ok(inner
            .shipments
            .values()
            .find(|s| s.carrier_order_code.as_deref() == Some(carrier_order_code))
            .cloned())
    }

    async fn update_shipment(&self, shipping: &Shipping) -> Result<Shipping> {
        let mut inner = self.inner.write().await;
        let stored = inner
            .shipments
            .get_mut(&shipping.id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "shipment",
                key: shipping.id.to_string(),
            })?;

        if stored.version != shipping.version {
            return Err(StoreError::VersionConflict {
                entity: "shipment",
                key: shipping.id.to_string(),
                expected: shipping.version,
            });
        }

        let mut updated = shipping.clone();
        updated.version += 1;
        *stored = updated.clone();
        Ok(updated)
    }
}

#[async_trait]
impl ShipmentIntentStore for InMemoryStore {
    async fn get_intent(&self, id: Uuid) -> Result<Option<ShipmentIntent>> {
        Ok(self.inner.read().await.intents.get(&id).cloned())
    }

    async fn get_intent_for_order(&self, order_id: OrderId) -> Result<Option<ShipmentIntent>> {
        let inner = self.inner.read().await;
        Ok(inner
            .intents
            .values()
            .find(|i| i.order_id == order_id)
            .cloned())
    }

    async fn update_intent(&self, intent: &ShipmentIntent) -> Result<()> {
        let mut inner = self.inner.write().await;
        if !inner.intents.contains_key(&intent.id) {
            return Err(StoreError::NotFound {
                entity: "shipment intent",
                key: intent.id.to_string(),
            });
        }
        inner.intents.insert(intent.id, intent.clone());
        Ok(())
    }

    async fn pending_intents(&self, limit: i64) -> Result<Vec<ShipmentIntent>> {
        let inner = self.inner.read().await;
        let mut pending: Vec<ShipmentIntent> = inner
            .intents
            .values()
            .filter(|i| i.status == domain::IntentStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|i| i.created_at);
        pending.truncate(limit.max(0) as usize);
        Ok(pending)
    }
}

#[async_trait]
impl WebhookEventStore for InMemoryStore {
    async fn insert_webhook_event(&self, record: &WebhookEventRecord) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.webhook_events.push(record.clone());
        Ok(())
    }

    async fn list_webhook_events(
        &self,
        filter: &WebhookEventFilter,
    ) -> Result<Vec<WebhookEventRecord>> {
        let inner = self.inner.read().await;
        let mut events: Vec<WebhookEventRecord> = inner
            .webhook_events
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        events.sort_by(|a, b| b.received_at.cmp(&a.received_at));
        let events = events
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .collect();
        Ok(events)
    }

    async fn count_webhook_events(&self, filter: &WebhookEventFilter) -> Result<i64> {
        let inner = self.inner.read().await;
        Ok(inner
            .webhook_events
            .iter()
            .filter(|e| filter.matches(e))
            .count() as i64)
    }

    async fn delete_webhook_events_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut inner = self.inner.write().await;
        let before = inner.webhook_events.len();
        inner.webhook_events.retain(|e| e.received_at >= cutoff);
        Ok((before - inner.webhook_events.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webhook::WebhookSource;
    use chrono::{Duration, TimeZone};
    use common::Money;
    use domain::{OrderLine, PaymentMethod, Recipient};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 6, 12, 0, 0).unwrap()
    }

    fn sample_order(number: &str) -> (Order, Payment, ShipmentIntent) {
        let order = Order::new(
            number.to_string(),
            vec![OrderLine::new("SKU-001", "Widget", Money::from_cents(1000), 2)],
            Money::from_cents(300),
            Money::zero(),
            None,
            now(),
        )
        .unwrap();
        let payment = Payment::new(
            order.id,
            PaymentMethod::Gateway,
            order.total,
            number.to_string(),
            now(),
        )
        .unwrap();
        let intent = ShipmentIntent::new(order.id, now());
        (order, payment, intent)
    }

    fn sample_recipient() -> Recipient {
        Recipient {
            name: "Nguyen Van A".to_string(),
            phone: "0900000001".to_string(),
            address: "12 Ly Thuong Kiet".to_string(),
            province: "Hanoi".to_string(),
            district: "Hoan Kiem".to_string(),
            ward: "Trang Tien".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_lookup_order() {
        let store = InMemoryStore::new();
        let (order, payment, intent) = sample_order("ORD-1");

        store.create_order(&order, &payment, &intent).await.unwrap();

        let loaded = store.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(loaded, order);

        let by_number = store.get_order_by_number("ORD-1").await.unwrap().unwrap();
        assert_eq!(by_number.id, order.id);

        assert!(store.get_intent_for_order(order.id).await.unwrap().is_some());
        assert!(
            store
                .latest_payment_for_order(order.id)
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_duplicate_order_number_rejected() {
        let store = InMemoryStore::new();
        let (order, payment, intent) = sample_order("ORD-1");
        store.create_order(&order, &payment, &intent).await.unwrap();

        let (order2, payment2, intent2) = sample_order("ORD-1");
        let result = store.create_order(&order2, &payment2, &intent2).await;
        assert!(matches!(result, Err(StoreError::Duplicate { .. })));
    }

    #[tokio::test]
    async fn test_payment_version_conflict() {
        let store = InMemoryStore::new();
        let (order, payment, intent) = sample_order("ORD-1");
        store.create_order(&order, &payment, &intent).await.unwrap();

        let mut first = payment.clone();
        first.cancel(now());
        let updated = store.update_payment(&first).await.unwrap();
        assert_eq!(updated.version, 1);

        // A concurrent writer still holding version 0 loses the race.
        let mut second = payment.clone();
        second.mark_paid(now());
        let result = store.update_payment(&second).await;
        assert!(matches!(result, Err(StoreError::VersionConflict { .. })));
    }

    #[tokio::test]
    async fn test_active_payment_selection() {
        let store = InMemoryStore::new();
        let (order, payment, intent) = sample_order("ORD-1");
        store.create_order(&order, &payment, &intent).await.unwrap();

        let mut cancelled = payment.clone();
        cancelled.cancel(now());
        store.update_payment(&cancelled).await.unwrap();

        assert!(
            store
                .active_payment_for_order(order.id)
                .await
                .unwrap()
                .is_none()
        );

        let replacement = Payment::new(
            order.id,
            PaymentMethod::Cod,
            order.total,
            "ORD-1".to_string(),
            now() + Duration::minutes(1),
        )
        .unwrap();
        store.insert_payment(&replacement).await.unwrap();

        let active = store
            .active_payment_for_order(order.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(active.id, replacement.id);
    }

    #[tokio::test]
    async fn test_shipment_unique_per_order() {
        let store = InMemoryStore::new();
        let (order, payment, intent) = sample_order("ORD-1");
        store.create_order(&order, &payment, &intent).await.unwrap();

        let shipping = Shipping::new(order.id, sample_recipient(), now());
        store.insert_shipment(&shipping).await.unwrap();

        let second = Shipping::new(order.id, sample_recipient(), now());
        let result = store.insert_shipment(&second).await;
        assert!(matches!(result, Err(StoreError::Duplicate { .. })));
    }

    #[tokio::test]
    async fn test_webhook_event_listing_and_retention() {
        let store = InMemoryStore::new();

        for days_ago in [0, 10, 40] {
            let mut record = WebhookEventRecord::new(
                WebhookSource::Payment,
                true,
                now() - Duration::days(days_ago),
            );
            record.order_ref = Some(format!("ORD-{days_ago}"));
            store.insert_webhook_event(&record).await.unwrap();
        }

        let all = store
            .list_webhook_events(&WebhookEventFilter::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 3);
        // Newest first.
        assert_eq!(all[0].order_ref.as_deref(), Some("ORD-0"));

        let removed = store
            .delete_webhook_events_before(now() - Duration::days(30))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.webhook_event_count().await, 2);
    }

    #[tokio::test]
    async fn test_stale_pending_payments() {
        let store = InMemoryStore::new();
        let (order, payment, intent) = sample_order("ORD-1");
        store.create_order(&order, &payment, &intent).await.unwrap();

        let stale = store
            .stale_pending_payments(now() + Duration::minutes(31))
            .await
            .unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].id, payment.id);

        let fresh = store
            .stale_pending_payments(now() - Duration::minutes(1))
            .await
            .unwrap();
        assert!(fresh.is_empty());
    }
}

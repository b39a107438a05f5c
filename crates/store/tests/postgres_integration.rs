//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use common::{Money, OrderId};
use domain::{
    Order, OrderLine, OrderStatus, Payment, PaymentMethod, Recipient, ShipmentIntent, Shipping,
    ShippingStatus,
};
use sqlx::PgPool;
use store::{
    OrderStore, PaymentStore, PostgresStore, ShipmentIntentStore, ShipmentStore, StoreError,
    WebhookEventFilter, WebhookEventRecord, WebhookEventStore, WebhookSource,
};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            // Create a temporary pool just for migrations
            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            // Run migrations using raw_sql to execute multiple statements
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_fulfillment_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();

            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    // Clear tables for test isolation
    sqlx::query(
        "TRUNCATE TABLE orders, order_lines, payments, shipments, shipment_intents, webhook_events",
    )
    .execute(&pool)
    .await
    .unwrap();

    PostgresStore::new(pool)
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 8, 6, 12, 0, 0).unwrap()
}

fn sample_order(number: &str) -> (Order, Payment, ShipmentIntent) {
    let order = Order::new(
        number.to_string(),
        vec![
            OrderLine::new("SKU-001", "Widget", Money::from_cents(1000), 2),
            OrderLine::new("SKU-002", "Gadget", Money::from_cents(2500), 1),
        ],
        Money::from_cents(300),
        Money::from_cents(500),
        Some("SAVE5".to_string()),
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
async fn create_and_load_order_roundtrip() {
    let store = get_test_store().await;
    let (order, payment, intent) = sample_order("ORD-PG-1");

    store.create_order(&order, &payment, &intent).await.unwrap();

    let loaded = store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(loaded, order);

    let by_number = store
        .get_order_by_number("ORD-PG-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_number.id, order.id);

    let loaded_payment = store
        .latest_payment_for_order(order.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded_payment, payment);

    let loaded_intent = store.get_intent_for_order(order.id).await.unwrap().unwrap();
    assert_eq!(loaded_intent, intent);
}

#[tokio::test]
async fn duplicate_order_number_is_rejected() {
    let store = get_test_store().await;
    let (order, payment, intent) = sample_order("ORD-PG-DUP");
    store.create_order(&order, &payment, &intent).await.unwrap();

    let (order2, payment2, intent2) = sample_order("ORD-PG-DUP");
    let result = store.create_order(&order2, &payment2, &intent2).await;
    assert!(matches!(result, Err(StoreError::Duplicate { .. })));

    // The failed transaction must not leave partial rows behind.
    assert!(store.get_order(order2.id).await.unwrap().is_none());
    assert!(
        store
            .latest_payment_for_order(order2.id)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn order_status_update_roundtrip() {
    let store = get_test_store().await;
    let (mut order, payment, intent) = sample_order("ORD-PG-2");
    store.create_order(&order, &payment, &intent).await.unwrap();

    order
        .transition_to(OrderStatus::Processing, now() + Duration::minutes(5))
        .unwrap();
    store.update_order(&order).await.unwrap();

    let loaded = store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, OrderStatus::Processing);
}

#[tokio::test]
async fn payment_optimistic_update_conflicts() {
    let store = get_test_store().await;
    let (order, payment, intent) = sample_order("ORD-PG-3");
    store.create_order(&order, &payment, &intent).await.unwrap();

    let mut first = payment.clone();
    first.mark_paid(now());
    let updated = store.update_payment(&first).await.unwrap();
    assert_eq!(updated.version, 1);

    let mut second = payment.clone();
    second.cancel(now());
    let result = store.update_payment(&second).await;
    assert!(matches!(result, Err(StoreError::VersionConflict { .. })));

    let stored = store.get_payment(payment.id).await.unwrap().unwrap();
    assert_eq!(stored.status, domain::PaymentStatus::Paid);
    assert_eq!(stored.version, 1);
}

#[tokio::test]
async fn shipment_roundtrip_and_carrier_code_lookup() {
    let store = get_test_store().await;
    let (order, payment, intent) = sample_order("ORD-PG-4");
    store.create_order(&order, &payment, &intent).await.unwrap();

    let mut shipping = Shipping::new(order.id, sample_recipient(), now());
    shipping.carrier_order_code = Some("GHN123".to_string());
    shipping.tracking_number = Some("GHN123".to_string());
    store.insert_shipment(&shipping).await.unwrap();

    let by_code = store
        .get_shipment_by_carrier_code("GHN123")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_code, shipping);

    let mut updated = by_code;
    updated.apply_status(ShippingStatus::Shipped, now() + Duration::hours(1));
    let stored = store.update_shipment(&updated).await.unwrap();
    assert_eq!(stored.version, 1);

    let reloaded = store
        .get_shipment_for_order(order.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reloaded.status, ShippingStatus::Shipped);
    assert!(reloaded.shipped_at.is_some());
}

#[tokio::test]
async fn pending_intents_are_listed_oldest_first() {
    let store = get_test_store().await;

    let (order_a, payment_a, mut intent_a) = sample_order("ORD-PG-5A");
    intent_a.created_at = now() - Duration::minutes(10);
    store
        .create_order(&order_a, &payment_a, &intent_a)
        .await
        .unwrap();

    let (order_b, payment_b, intent_b) = sample_order("ORD-PG-5B");
    store
        .create_order(&order_b, &payment_b, &intent_b)
        .await
        .unwrap();

    let pending = store.pending_intents(10).await.unwrap();
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0].order_id, order_a.id);

    let mut completed = intent_b.clone();
    completed.complete(now());
    store.update_intent(&completed).await.unwrap();

    let pending = store.pending_intents(10).await.unwrap();
    assert_eq!(pending.len(), 1);
}

#[tokio::test]
async fn webhook_event_filtering_and_retention() {
    let store = get_test_store().await;

    for (days_ago, success) in [(0i64, true), (1, false), (40, true)] {
        let mut record = WebhookEventRecord::new(
            WebhookSource::Payment,
            success,
            now() - Duration::days(days_ago),
        );
        record.order_ref = Some(format!("ORD-PG-{days_ago}"));
        record.response_code = Some("00".to_string());
        record.metadata = serde_json::json!({"days_ago": days_ago});
        store.insert_webhook_event(&record).await.unwrap();
    }

    let all = store
        .list_webhook_events(&WebhookEventFilter::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].order_ref.as_deref(), Some("ORD-PG-0"));

    let failures = store
        .list_webhook_events(&WebhookEventFilter {
            success: Some(false),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(failures.len(), 1);

    let count = store
        .count_webhook_events(&WebhookEventFilter::default())
        .await
        .unwrap();
    assert_eq!(count, 3);

    let removed = store
        .delete_webhook_events_before(now() - Duration::days(30))
        .await
        .unwrap();
    assert_eq!(removed, 1);
}

#[tokio::test]
async fn missing_order_lookup_returns_none() {
    let store = get_test_store().await;
    assert!(store.get_order(OrderId::new()).await.unwrap().is_none());
}

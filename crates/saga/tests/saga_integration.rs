//! End-to-end saga tests over the in-memory store and mock carrier.

use carrier::{CarrierApi, CarrierStatus, MockCarrier};
use chrono::{Duration, Utc};
use common::Money;
use domain::{
    IntentStatus, OrderStatus, PaymentMethod, PaymentStatus, Recipient, ShippingStatus,
};
use gateway::{PaymentCallback, VnpayConfig, VnpayGateway};
use saga::{
    CallbackOutcome, CreateOrderInput, InMemoryCatalogService, InMemoryNotificationService,
    InMemoryVoucherService, Orchestrator, OrderLineInput, SagaError, ShipmentOutcome, VoucherClaim,
};
use store::{InMemoryStore, PaymentStore, ShipmentIntentStore};

type TestOrchestrator = Orchestrator<
    InMemoryStore,
    MockCarrier,
    InMemoryCatalogService,
    InMemoryVoucherService,
    InMemoryNotificationService,
>;

struct Harness {
    orchestrator: TestOrchestrator,
    store: InMemoryStore,
    carrier: MockCarrier,
    catalog: InMemoryCatalogService,
    vouchers: InMemoryVoucherService,
    notifier: InMemoryNotificationService,
}

fn setup() -> Harness {
    let store = InMemoryStore::new();
    let carrier = MockCarrier::new();
    let catalog = InMemoryCatalogService::new();
    let vouchers = InMemoryVoucherService::new();
    let notifier = InMemoryNotificationService::new();

    catalog.add_product("SKU-001", "Widget", Money::from_cents(1000), 10);
    catalog.add_product("SKU-002", "Gadget", Money::from_cents(2500), 5);
    vouchers.add_percent_voucher("SALE10", 10, Money::zero(), 10);

    let gateway = VnpayGateway::new(VnpayConfig {
        tmn_code: "TESTTMN1".to_string(),
        secret: "test-secret".to_string(),
        ..VnpayConfig::default()
    });

    let orchestrator = Orchestrator::new(
        store.clone(),
        gateway,
        carrier.clone(),
        catalog.clone(),
        vouchers.clone(),
        notifier.clone(),
    );

    Harness {
        orchestrator,
        store,
        carrier,
        catalog,
        vouchers,
        notifier,
    }
}

fn recipient() -> Recipient {
    Recipient {
        name: "Nguyen Van A".to_string(),
        phone: "0900000001".to_string(),
        address: "12 Ly Thuong Kiet".to_string(),
        province: "Hanoi".to_string(),
        district: "Hoan Kiem".to_string(),
        ward: "Trang Tien".to_string(),
    }
}

fn order_input(method: PaymentMethod) -> CreateOrderInput {
    CreateOrderInput {
        lines: vec![
            OrderLineInput {
                sku: "SKU-001".to_string(),
                quantity: 2,
                unit_price: Money::from_cents(1000),
            },
            OrderLineInput {
                sku: "SKU-002".to_string(),
                quantity: 1,
                unit_price: Money::from_cents(2500),
            },
        ],
        payment_method: method,
        recipient: recipient(),
        voucher: None,
        client_ip: "203.0.113.10".to_string(),
    }
}

fn success_callback(order: &domain::Order) -> PaymentCallback {
    PaymentCallback {
        txn_ref: order.order_number.clone(),
        amount: order.total,
        response_code: "00".to_string(),
        transaction_status: "00".to_string(),
        transaction_no: Some("14600001".to_string()),
        bank_code: Some("NCB".to_string()),
        pay_date: Some(Utc::now()),
    }
}

#[tokio::test]
async fn test_gateway_order_happy_path() {
    let h = setup();

    let outcome = h
        .orchestrator
        .create_order(order_input(PaymentMethod::Gateway))
        .await
        .unwrap();

    // Order: pending, totals computed from catalog prices plus the quoted fee.
    assert_eq!(outcome.order.status, OrderStatus::Pending);
    assert_eq!(outcome.order.subtotal.cents(), 4500);
    assert_eq!(outcome.order.shipping_fee.cents(), 30_000);
    assert_eq!(outcome.order.total.cents(), 34_500);
    assert!(!outcome.order.is_paid);

    // Payment: exactly one, Pending, with a signed redirect URL.
    assert_eq!(outcome.payment.status, PaymentStatus::Pending);
    let url = outcome.payment_url.unwrap();
    assert!(url.contains("vnp_SecureHash="));
    assert!(url.contains(&format!("vnp_TxnRef={}", outcome.order.order_number)));

    // Shipping: pending with a carrier tracking code.
    let shipping = outcome.shipment.shipping().unwrap();
    assert_eq!(shipping.status, ShippingStatus::Pending);
    assert_eq!(shipping.carrier_order_code.as_deref(), Some("GHN000001"));
    assert_eq!(shipping.tracking_number.as_deref(), Some("GHN000001"));

    // Intent completed, stock decremented.
    let intent = h
        .store
        .get_intent_for_order(outcome.order.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(intent.status, IntentStatus::Completed);
    assert_eq!(h.catalog.stock_of("SKU-001"), Some(8));
    assert_eq!(h.catalog.stock_of("SKU-002"), Some(4));
}

#[tokio::test]
async fn test_successful_callback_marks_paid() {
    let h = setup();
    let outcome = h
        .orchestrator
        .create_order(order_input(PaymentMethod::Gateway))
        .await
        .unwrap();

    let callback = success_callback(&outcome.order);
    let result = h
        .orchestrator
        .payments()
        .apply_gateway_callback(&callback, Utc::now())
        .await
        .unwrap();

    let CallbackOutcome::Applied { payment, paid } = result else {
        panic!("expected Applied");
    };
    assert!(paid);
    assert_eq!(payment.status, PaymentStatus::Paid);
    assert_eq!(payment.gateway_txn_no.as_deref(), Some("14600001"));

    let order = h.orchestrator.orders().load(outcome.order.id).await.unwrap();
    assert!(order.is_paid);
    assert_eq!(order.paid_at, callback.pay_date);
}

#[tokio::test]
async fn test_duplicate_callback_is_idempotent() {
    let h = setup();
    let outcome = h
        .orchestrator
        .create_order(order_input(PaymentMethod::Gateway))
        .await
        .unwrap();

    let callback = success_callback(&outcome.order);
    h.orchestrator
        .payments()
        .apply_gateway_callback(&callback, Utc::now())
        .await
        .unwrap();

    let replay = h
        .orchestrator
        .payments()
        .apply_gateway_callback(&callback, Utc::now())
        .await
        .unwrap();
    let CallbackOutcome::AlreadyProcessed { payment } = replay else {
        panic!("expected AlreadyProcessed");
    };
    assert_eq!(payment.status, PaymentStatus::Paid);
}

#[tokio::test]
async fn test_failed_callback_marks_failed_not_paid() {
    let h = setup();
    let outcome = h
        .orchestrator
        .create_order(order_input(PaymentMethod::Gateway))
        .await
        .unwrap();

    let mut callback = success_callback(&outcome.order);
    callback.response_code = "24".to_string();

    let result = h
        .orchestrator
        .payments()
        .apply_gateway_callback(&callback, Utc::now())
        .await
        .unwrap();
    let CallbackOutcome::Applied { payment, paid } = result else {
        panic!("expected Applied");
    };
    assert!(!paid);
    assert_eq!(payment.status, PaymentStatus::Failed);

    let order = h.orchestrator.orders().load(outcome.order.id).await.unwrap();
    assert!(!order.is_paid);
    assert!(order.paid_at.is_none());
}

#[tokio::test]
async fn test_callback_amount_mismatch() {
    let h = setup();
    let outcome = h
        .orchestrator
        .create_order(order_input(PaymentMethod::Gateway))
        .await
        .unwrap();

    let mut callback = success_callback(&outcome.order);
    callback.amount = Money::from_cents(1);

    let result = h
        .orchestrator
        .payments()
        .apply_gateway_callback(&callback, Utc::now())
        .await
        .unwrap();
    assert!(matches!(result, CallbackOutcome::AmountMismatch { .. }));

    // Nothing changed.
    let payment = h
        .store
        .latest_payment_for_order(outcome.order.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Pending);
}

#[tokio::test]
async fn test_callback_for_unknown_order() {
    let h = setup();
    let callback = PaymentCallback {
        txn_ref: "ORD-19700101-DEADBEEF".to_string(),
        amount: Money::from_cents(100),
        response_code: "00".to_string(),
        transaction_status: "00".to_string(),
        transaction_no: None,
        bank_code: None,
        pay_date: None,
    };

    let result = h
        .orchestrator
        .payments()
        .apply_gateway_callback(&callback, Utc::now())
        .await
        .unwrap();
    assert!(matches!(result, CallbackOutcome::OrderUnknown));
}

#[tokio::test]
async fn test_shipment_deferred_then_swept() {
    let h = setup();
    h.carrier.set_fail_on_create(true);

    let outcome = h
        .orchestrator
        .create_order(order_input(PaymentMethod::Gateway))
        .await
        .unwrap();

    // Order and payment committed, shipment deferred.
    let ShipmentOutcome::Deferred { error } = &outcome.shipment else {
        panic!("expected Deferred");
    };
    assert!(error.contains("carrier"));

    let intent = h
        .store
        .get_intent_for_order(outcome.order.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(intent.status, IntentStatus::Pending);
    assert_eq!(intent.attempts, 1);

    // Shipment record exists (recipient preserved) but carries no code.
    let shipping = h
        .orchestrator
        .shipments()
        .load_for_order(outcome.order.id)
        .await
        .unwrap();
    assert!(shipping.carrier_order_code.is_none());

    // Carrier recovers; the sweep dispatches the intent.
    h.carrier.set_fail_on_create(false);
    let stats = h.orchestrator.sweep_pending_shipments().await.unwrap();
    assert_eq!(stats.attempted, 1);
    assert_eq!(stats.dispatched, 1);

    let shipping = h
        .orchestrator
        .shipments()
        .load_for_order(outcome.order.id)
        .await
        .unwrap();
    assert!(shipping.carrier_order_code.is_some());

    let intent = h
        .store
        .get_intent_for_order(outcome.order.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(intent.status, IntentStatus::Completed);
}

#[tokio::test]
async fn test_sweep_abandons_after_max_attempts() {
    let h = setup();
    h.carrier.set_fail_on_create(true);

    let outcome = h
        .orchestrator
        .create_order(order_input(PaymentMethod::Gateway))
        .await
        .unwrap();

    for _ in 0..10 {
        h.orchestrator.sweep_pending_shipments().await.unwrap();
    }

    let intent = h
        .store
        .get_intent_for_order(outcome.order.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(intent.status, IntentStatus::Abandoned);
    assert!(intent.attempts >= saga::MAX_SHIPMENT_ATTEMPTS);
}

#[tokio::test]
async fn test_processing_requires_settled_payment() {
    let h = setup();
    let outcome = h
        .orchestrator
        .create_order(order_input(PaymentMethod::Gateway))
        .await
        .unwrap();

    let result = h
        .orchestrator
        .update_status(outcome.order.id, OrderStatus::Processing)
        .await;
    assert!(matches!(result, Err(SagaError::PaymentRequired(_))));

    // After a successful callback the transition goes through.
    h.orchestrator
        .payments()
        .apply_gateway_callback(&success_callback(&outcome.order), Utc::now())
        .await
        .unwrap();
    let order = h
        .orchestrator
        .update_status(outcome.order.id, OrderStatus::Processing)
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Processing);
}

#[tokio::test]
async fn test_cod_order_completes_and_reconciles() {
    let h = setup();
    let outcome = h
        .orchestrator
        .create_order(order_input(PaymentMethod::Cod))
        .await
        .unwrap();
    assert_eq!(outcome.payment.status, PaymentStatus::Unpaid);
    assert!(outcome.payment_url.is_none());

    // COD can enter Processing unpaid.
    h.orchestrator
        .update_status(outcome.order.id, OrderStatus::Processing)
        .await
        .unwrap();

    let order = h
        .orchestrator
        .update_status(outcome.order.id, OrderStatus::Completed)
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Completed);
    assert!(order.completed_at.is_some());
    assert!(order.is_paid);

    let payment = h
        .store
        .latest_payment_for_order(outcome.order.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Paid);

    let shipping = h
        .orchestrator
        .shipments()
        .load_for_order(outcome.order.id)
        .await
        .unwrap();
    assert_eq!(shipping.status, ShippingStatus::Delivered);
    assert!(shipping.delivered_at.is_some());

    assert_eq!(h.notifier.sent_count(), 2);
}

#[tokio::test]
async fn test_pending_to_completed_is_rejected() {
    let h = setup();
    let outcome = h
        .orchestrator
        .create_order(order_input(PaymentMethod::Cod))
        .await
        .unwrap();

    let result = h
        .orchestrator
        .update_status(outcome.order.id, OrderStatus::Completed)
        .await;
    assert!(matches!(
        result,
        Err(SagaError::Domain(domain::DomainError::InvalidTransition { .. }))
    ));
}

#[tokio::test]
async fn test_cancel_pending_order_cancels_everything() {
    let h = setup();
    let outcome = h
        .orchestrator
        .create_order(order_input(PaymentMethod::Gateway))
        .await
        .unwrap();

    let order = h.orchestrator.cancel_order(outcome.order.id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Cancelled);
    assert!(order.canceled_at.is_some());

    let payment = h
        .store
        .latest_payment_for_order(outcome.order.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Cancelled);

    let shipping = h
        .orchestrator
        .shipments()
        .load_for_order(outcome.order.id)
        .await
        .unwrap();
    assert_eq!(shipping.status, ShippingStatus::Cancelled);

    // Carrier-side order is cancelled too.
    let code = shipping.carrier_order_code.unwrap();
    assert_eq!(
        h.carrier.order_status(&code).await.unwrap(),
        CarrierStatus::Cancel
    );
}

#[tokio::test]
async fn test_cancel_paid_pending_order_flags_refund() {
    let h = setup();
    let outcome = h
        .orchestrator
        .create_order(order_input(PaymentMethod::Gateway))
        .await
        .unwrap();
    h.orchestrator
        .payments()
        .apply_gateway_callback(&success_callback(&outcome.order), Utc::now())
        .await
        .unwrap();

    h.orchestrator.cancel_order(outcome.order.id).await.unwrap();

    let payment = h
        .store
        .latest_payment_for_order(outcome.order.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Paid);
    assert!(payment.refund_required);
}

#[tokio::test]
async fn test_operator_refund_after_flagged_cancel() {
    let h = setup();
    let outcome = h
        .orchestrator
        .create_order(order_input(PaymentMethod::Gateway))
        .await
        .unwrap();
    h.orchestrator
        .payments()
        .apply_gateway_callback(&success_callback(&outcome.order), Utc::now())
        .await
        .unwrap();
    h.orchestrator.cancel_order(outcome.order.id).await.unwrap();

    let refunded = h
        .orchestrator
        .refund_payment(outcome.order.id)
        .await
        .unwrap();
    assert_eq!(refunded.status, PaymentStatus::Refunded);
    assert!(!refunded.refund_required);

    // A second refund attempt is rejected: Refunded is not Paid.
    let result = h.orchestrator.refund_payment(outcome.order.id).await;
    assert!(matches!(
        result,
        Err(SagaError::Domain(domain::DomainError::RefundNotPaid { .. }))
    ));
}

#[tokio::test]
async fn test_cancel_forbidden_when_processing_paid() {
    let h = setup();
    let outcome = h
        .orchestrator
        .create_order(order_input(PaymentMethod::Gateway))
        .await
        .unwrap();
    h.orchestrator
        .payments()
        .apply_gateway_callback(&success_callback(&outcome.order), Utc::now())
        .await
        .unwrap();
    h.orchestrator
        .update_status(outcome.order.id, OrderStatus::Processing)
        .await
        .unwrap();

    let result = h.orchestrator.cancel_order(outcome.order.id).await;
    assert!(matches!(result, Err(SagaError::CancelForbidden { .. })));
}

#[tokio::test]
async fn test_cancel_forbidden_when_completed() {
    let h = setup();
    let outcome = h
        .orchestrator
        .create_order(order_input(PaymentMethod::Cod))
        .await
        .unwrap();
    h.orchestrator
        .update_status(outcome.order.id, OrderStatus::Processing)
        .await
        .unwrap();
    h.orchestrator
        .update_status(outcome.order.id, OrderStatus::Completed)
        .await
        .unwrap();

    let result = h.orchestrator.cancel_order(outcome.order.id).await;
    assert!(matches!(result, Err(SagaError::CancelForbidden { .. })));
}

#[tokio::test]
async fn test_retry_payment_after_failure() {
    let h = setup();
    let outcome = h
        .orchestrator
        .create_order(order_input(PaymentMethod::Gateway))
        .await
        .unwrap();

    let mut callback = success_callback(&outcome.order);
    callback.response_code = "24".to_string();
    h.orchestrator
        .payments()
        .apply_gateway_callback(&callback, Utc::now())
        .await
        .unwrap();

    let view = h.orchestrator.check_payment(outcome.order.id).await.unwrap();
    assert_eq!(view.payment.status, PaymentStatus::Failed);
    assert!(view.retry_eligible);

    let (payment, url) = h
        .orchestrator
        .retry_payment(outcome.order.id, None, "203.0.113.10")
        .await
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert!(url.is_some());

    // Exactly one active payment afterwards.
    let active = h
        .store
        .active_payment_for_order(outcome.order.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(active.id, payment.id);
}

#[tokio::test]
async fn test_retry_rejected_while_payment_fresh_pending() {
    let h = setup();
    let outcome = h
        .orchestrator
        .create_order(order_input(PaymentMethod::Gateway))
        .await
        .unwrap();

    let result = h
        .orchestrator
        .retry_payment(outcome.order.id, None, "203.0.113.10")
        .await;
    assert!(matches!(result, Err(SagaError::PaymentNotRetryable { .. })));
}

#[tokio::test]
async fn test_stale_payment_sweep() {
    let h = setup();
    let outcome = h
        .orchestrator
        .create_order(order_input(PaymentMethod::Gateway))
        .await
        .unwrap();

    // Backdate the pending payment past the staleness window.
    let mut payment = h
        .store
        .latest_payment_for_order(outcome.order.id)
        .await
        .unwrap()
        .unwrap();
    payment.created_at = Utc::now() - Duration::minutes(45);
    h.store.update_payment(&payment).await.unwrap();

    let swept = h.orchestrator.sweep_stale_payments().await.unwrap();
    assert_eq!(swept, 1);

    let view = h.orchestrator.check_payment(outcome.order.id).await.unwrap();
    assert_eq!(view.payment.status, PaymentStatus::Cancelled);
    assert!(view.retry_eligible);
}

#[tokio::test]
async fn test_tracking_sync_maps_and_is_idempotent() {
    let h = setup();
    let outcome = h
        .orchestrator
        .create_order(order_input(PaymentMethod::Gateway))
        .await
        .unwrap();
    let code = outcome
        .shipment
        .shipping()
        .unwrap()
        .carrier_order_code
        .clone()
        .unwrap();

    h.carrier.set_status(&code, CarrierStatus::Delivering);

    let (shipping, changed) = h
        .orchestrator
        .sync_shipment_tracking(outcome.order.id)
        .await
        .unwrap();
    assert!(changed);
    assert_eq!(shipping.status, ShippingStatus::OutForDelivery);
    let shipped_at = shipping.shipped_at;
    assert!(shipped_at.is_some());

    // Re-applying the same carrier status is a no-op.
    let (shipping, changed) = h
        .orchestrator
        .sync_shipment_tracking(outcome.order.id)
        .await
        .unwrap();
    assert!(!changed);
    assert_eq!(shipping.shipped_at, shipped_at);
}

#[tokio::test]
async fn test_unknown_carrier_status_maps_to_unknown() {
    let h = setup();
    let outcome = h
        .orchestrator
        .create_order(order_input(PaymentMethod::Gateway))
        .await
        .unwrap();
    let code = outcome
        .shipment
        .shipping()
        .unwrap()
        .carrier_order_code
        .clone()
        .unwrap();

    h.carrier
        .set_status(&code, CarrierStatus::Unknown("hyperspace".to_string()));

    let (shipping, changed) = h
        .orchestrator
        .sync_shipment_tracking(outcome.order.id)
        .await
        .unwrap();
    assert!(changed);
    assert_eq!(shipping.status, ShippingStatus::Unknown);
}

#[tokio::test]
async fn test_validation_rejections() {
    let h = setup();

    // Unknown product.
    let mut input = order_input(PaymentMethod::Gateway);
    input.lines[0].sku = "SKU-404".to_string();
    assert!(matches!(
        h.orchestrator.create_order(input).await,
        Err(SagaError::UnknownProduct { .. })
    ));

    // Insufficient stock.
    let mut input = order_input(PaymentMethod::Gateway);
    input.lines[0].quantity = 99;
    assert!(matches!(
        h.orchestrator.create_order(input).await,
        Err(SagaError::InsufficientStock { .. })
    ));

    // Price drift beyond tolerance.
    let mut input = order_input(PaymentMethod::Gateway);
    input.lines[0].unit_price = Money::from_cents(900);
    assert!(matches!(
        h.orchestrator.create_order(input).await,
        Err(SagaError::PriceMismatch { .. })
    ));

    // Empty order.
    let mut input = order_input(PaymentMethod::Gateway);
    input.lines.clear();
    assert!(matches!(
        h.orchestrator.create_order(input).await,
        Err(SagaError::NoLines)
    ));

    // Nothing was persisted.
    assert_eq!(h.store.order_count().await, 0);
}

#[tokio::test]
async fn test_voucher_applied_and_mismatch_rejected() {
    let h = setup();

    // Claimed discount matches the server-side recomputation: 10% of 4500.
    let mut input = order_input(PaymentMethod::Gateway);
    input.voucher = Some(VoucherClaim {
        code: "SALE10".to_string(),
        discount: Money::from_cents(450),
    });
    let outcome = h.orchestrator.create_order(input).await.unwrap();
    assert_eq!(outcome.order.discount.cents(), 450);
    assert_eq!(outcome.order.total.cents(), 4500 + 30_000 - 450);
    assert_eq!(h.vouchers.usage_count("SALE10"), Some(1));

    // A claim that disagrees beyond tolerance is rejected.
    let mut input = order_input(PaymentMethod::Gateway);
    input.voucher = Some(VoucherClaim {
        code: "SALE10".to_string(),
        discount: Money::from_cents(2000),
    });
    assert!(matches!(
        h.orchestrator.create_order(input).await,
        Err(SagaError::DiscountMismatch { .. })
    ));
}

#[tokio::test]
async fn test_notification_failure_never_blocks_transition() {
    let h = setup();
    let outcome = h
        .orchestrator
        .create_order(order_input(PaymentMethod::Cod))
        .await
        .unwrap();

    h.notifier.set_fail_on_send(true);
    let order = h
        .orchestrator
        .update_status(outcome.order.id, OrderStatus::Processing)
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Processing);
    assert_eq!(h.notifier.sent_count(), 0);
}

#[tokio::test]
async fn test_unresolvable_address_rejects_creation() {
    let h = setup();
    let mut input = order_input(PaymentMethod::Gateway);
    input.recipient.ward = "Nowhere".to_string();

    let result = h.orchestrator.create_order(input).await;
    assert!(matches!(result, Err(SagaError::Carrier(_))));
    assert_eq!(h.store.order_count().await, 0);
}

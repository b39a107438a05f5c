//! The order fulfillment orchestrator.

use carrier::CarrierApi;
use chrono::Utc;
use common::Money;
use domain::{
    Order, OrderLine, OrderStatus, PaymentMethod, PaymentStatus, ShipmentIntent, Shipping,
    ShippingStatus, generate_order_number,
};
use gateway::VnpayGateway;
use store::{FulfillmentStore, OrderStore, ShipmentIntentStore, ShipmentStore, StoreError};

use crate::error::{Result, SagaError};
use crate::ledgers::payment::retry_eligible;
use crate::ledgers::shipping::weight_for_lines;
use crate::ledgers::{OrderLedger, PaymentLedger, ShipmentLedger};
use crate::services::{CatalogService, NotificationService, VoucherService};
use crate::types::{
    CreateOrderInput, CreateOrderOutcome, PRICE_TOLERANCE_CENTS, PaymentStatusView,
    ShipmentOutcome,
};

/// Attempts at generating a unique order number before giving up.
const ORDER_NUMBER_ATTEMPTS: u32 = 3;

/// Orchestrates the order fulfillment saga.
///
/// Coordinates the three ledgers, the external adapters, and the collaborator
/// services. The storage-atomic unit is the order + initial payment +
/// shipment intent insert; the carrier call happens after that commit and is
/// reconciled through the intent outbox when it fails.
pub struct Orchestrator<S, C, Cat, V, N>
where
    S: FulfillmentStore + Clone,
    C: CarrierApi,
    Cat: CatalogService,
    V: VoucherService,
    N: NotificationService,
{
    store: S,
    orders: OrderLedger<S>,
    payments: PaymentLedger<S>,
    shipments: ShipmentLedger<S, C>,
    catalog: Cat,
    vouchers: V,
    notifier: N,
}

impl<S, C, Cat, V, N> Orchestrator<S, C, Cat, V, N>
where
    S: FulfillmentStore + Clone,
    C: CarrierApi,
    Cat: CatalogService,
    V: VoucherService,
    N: NotificationService,
{
    /// Creates a new orchestrator.
    pub fn new(
        store: S,
        gateway: VnpayGateway,
        carrier: C,
        catalog: Cat,
        vouchers: V,
        notifier: N,
    ) -> Self {
        let orders = OrderLedger::new(store.clone());
        let payments = PaymentLedger::new(store.clone(), gateway);
        let shipments = ShipmentLedger::new(store.clone(), carrier);
        Self {
            store,
            orders,
            payments,
            shipments,
            catalog,
            vouchers,
            notifier,
        }
    }

    /// The order ledger.
    pub fn orders(&self) -> &OrderLedger<S> {
        &self.orders
    }

    /// The payment ledger.
    pub fn payments(&self) -> &PaymentLedger<S> {
        &self.payments
    }

    /// The shipment ledger.
    pub fn shipments(&self) -> &ShipmentLedger<S, C> {
        &self.shipments
    }

    pub(crate) fn store(&self) -> &S {
        &self.store
    }

    /// Creates a complete order: validated lines, voucher, order + payment +
    /// intent committed atomically, stock/voucher collaborators updated, then
    /// the carrier shipment created outside the transaction.
    ///
    /// A carrier failure after the commit does not roll anything back: the
    /// outcome carries `ShipmentOutcome::Deferred` and the pending intent is
    /// retried by the background sweep.
    #[tracing::instrument(skip(self, input), fields(method = %input.payment_method))]
    pub async fn create_order(&self, input: CreateOrderInput) -> Result<CreateOrderOutcome> {
        metrics::counter!("orders_requested_total").increment(1);
        let now = Utc::now();

        if input.lines.is_empty() {
            return Err(SagaError::NoLines);
        }

        // 1. Validate every line against current catalog stock and price.
        let mut lines = Vec::with_capacity(input.lines.len());
        let mut decrements = Vec::with_capacity(input.lines.len());
        for line in &input.lines {
            let product = self
                .catalog
                .get_product(&line.sku)
                .await?
                .ok_or_else(|| SagaError::UnknownProduct {
                    sku: line.sku.clone(),
                })?;

            if product.stock < line.quantity {
                return Err(SagaError::InsufficientStock {
                    sku: line.sku.clone(),
                    requested: line.quantity,
                    available: product.stock,
                });
            }
            if product.price.abs_diff(line.unit_price) > PRICE_TOLERANCE_CENTS {
                return Err(SagaError::PriceMismatch {
                    sku: line.sku.clone(),
                    expected: product.price,
                    submitted: line.unit_price,
                });
            }

            // Snapshot the catalog's authoritative name and price.
            lines.push(OrderLine::new(
                &product.sku,
                &product.name,
                product.price,
                line.quantity,
            ));
            decrements.push((product.sku, line.quantity));
        }

        let subtotal: Money = lines.iter().map(OrderLine::line_total).sum();

        // 2. Recompute the voucher discount server-side.
        let discount = match &input.voucher {
            Some(claim) => {
                let computed = self.vouchers.compute_discount(&claim.code, subtotal).await?;
                if computed.abs_diff(claim.discount) > PRICE_TOLERANCE_CENTS {
                    return Err(SagaError::DiscountMismatch {
                        computed,
                        claimed: claim.discount,
                    });
                }
                computed
            }
            None => Money::zero(),
        };

        // 3. Validate the destination and quote the fee before committing,
        //    so the order total is final.
        let weight_grams = weight_for_lines(&lines);
        let quote = self.shipments.quote(&input.recipient, weight_grams).await?;

        // 4. Atomic commit: order + initial payment + shipment intent.
        let (order, payment) = 'commit: {
            for attempt in 0..ORDER_NUMBER_ATTEMPTS {
                let candidate = Order::new(
                    generate_order_number(now),
                    lines.clone(),
                    quote.fee,
                    discount,
                    input.voucher.as_ref().map(|v| v.code.clone()),
                    now,
                )?;
                let initial = self
                    .payments
                    .build_initial(&candidate, input.payment_method, now)?;
                let intent = ShipmentIntent::new(candidate.id, now);

                match self.store.create_order(&candidate, &initial, &intent).await {
                    Ok(()) => break 'commit (candidate, initial),
                    Err(StoreError::Duplicate { .. }) if attempt + 1 < ORDER_NUMBER_ATTEMPTS => {
                        continue;
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            return Err(SagaError::Store(StoreError::Duplicate {
                entity: "order",
                key: "order number generation exhausted".to_string(),
            }));
        };

        // 5. Recipient snapshot, before the carrier call so a deferred
        //    dispatch still knows where to ship.
        let shipping = Shipping::new(order.id, input.recipient.clone(), now);
        self.store.insert_shipment(&shipping).await?;

        // 6. Collaborator updates. The order is committed; failures here are
        //    surfaced in logs, not rolled back.
        if let Err(e) = self.catalog.decrement_stock(&decrements).await {
            tracing::error!(order_id = %order.id, error = %e, "stock decrement failed after commit");
        }
        if let Some(claim) = &input.voucher
            && let Err(e) = self.vouchers.increment_usage(&claim.code).await
        {
            tracing::error!(order_id = %order.id, error = %e, "voucher usage increment failed");
        }

        let payment_url = self.payments.payment_url(&order, &payment, &input.client_ip);

        // 7. Carrier dispatch, outside the transaction.
        let cod_amount = match input.payment_method {
            PaymentMethod::Cod => order.total,
            PaymentMethod::Gateway | PaymentMethod::Card => Money::zero(),
        };
        let shipment = match self
            .shipments
            .dispatch_to_carrier(&order, cod_amount, now)
            .await
        {
            Ok(shipping) => {
                self.complete_intent(&order).await;
                ShipmentOutcome::Created(shipping)
            }
            Err(e) => {
                tracing::warn!(
                    order_id = %order.id,
                    error = %e,
                    "shipment creation deferred, order committed without carrier order"
                );
                self.record_intent_failure(&order, &e).await;
                metrics::counter!("shipments_deferred_total").increment(1);
                ShipmentOutcome::Deferred {
                    error: e.to_string(),
                }
            }
        };

        metrics::counter!("orders_created_total").increment(1);
        tracing::info!(order_id = %order.id, order_number = %order.order_number, "order created");

        Ok(CreateOrderOutcome {
            order,
            payment,
            payment_url,
            shipment,
        })
    }

    /// Applies a status transition with its side effects, then dispatches a
    /// best-effort notification.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(
        &self,
        order_id: common::OrderId,
        target: OrderStatus,
    ) -> Result<Order> {
        let now = Utc::now();
        let order = self.orders.load(order_id).await?;

        // Entering Processing requires a settled payment or COD.
        if target == OrderStatus::Processing {
            let payment = self.payments.latest(&order).await?;
            if payment.status != PaymentStatus::Paid && payment.method != PaymentMethod::Cod {
                return Err(SagaError::PaymentRequired(order_id));
            }
        }

        let order = self.orders.transition(order_id, target, now).await?;

        match target {
            OrderStatus::Processing => {
                // Shipment stays in its carrier-pending state; nothing to do
                // until the carrier reports pickup.
            }
            OrderStatus::Completed => {
                if let Err(e) = self
                    .shipments
                    .apply_status_for_order(order_id, ShippingStatus::Delivered, now)
                    .await
                {
                    tracing::warn!(%order_id, error = %e, "failed to mark shipment delivered");
                }
                if let Err(e) = self.payments.reconcile_cod(&order, now).await {
                    tracing::warn!(%order_id, error = %e, "failed to reconcile COD payment");
                }
            }
            OrderStatus::Cancelled => {
                if let Err(e) = self.shipments.cancel_for_order(order_id, now).await {
                    tracing::warn!(%order_id, error = %e, "failed to cancel shipment");
                }
                if let Err(e) = self.payments.cancel_active(&order, now).await {
                    tracing::warn!(%order_id, error = %e, "failed to cancel active payment");
                }
                match self.payments.latest(&order).await {
                    Ok(payment) if payment.status == PaymentStatus::Paid => {
                        tracing::warn!(
                            %order_id,
                            payment_id = %payment.id,
                            "cancelled order had a settled payment, refund required"
                        );
                        if let Err(e) = self.payments.mark_refund_required(&payment, now).await {
                            tracing::warn!(%order_id, error = %e, "failed to flag refund");
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(%order_id, error = %e, "failed to inspect payment on cancel")
                    }
                }
            }
            OrderStatus::Pending => {}
        }

        // Side effects may have touched the order (COD reconcile).
        let order = self.orders.load(order_id).await?;

        if let Err(e) = self.notifier.order_status_changed(&order).await {
            tracing::warn!(%order_id, error = %e, "notification dispatch failed");
        }

        Ok(order)
    }

    /// Reads the latest payment and whether it is retry-eligible.
    pub async fn check_payment(&self, order_id: common::OrderId) -> Result<PaymentStatusView> {
        let order = self.orders.load(order_id).await?;
        let payment = self.payments.latest(&order).await?;
        let retry_eligible = retry_eligible(&payment, Utc::now());
        Ok(PaymentStatusView {
            payment,
            retry_eligible,
        })
    }

    /// Retries payment for an order: cancels the active payment and creates
    /// a fresh one, re-entering the gateway flow when the method needs it.
    #[tracing::instrument(skip(self))]
    pub async fn retry_payment(
        &self,
        order_id: common::OrderId,
        method: Option<PaymentMethod>,
        client_ip: &str,
    ) -> Result<(domain::Payment, Option<String>)> {
        let now = Utc::now();
        let order = self.orders.load(order_id).await?;
        if order.status.is_terminal() {
            return Err(SagaError::Domain(domain::DomainError::TerminalStatus {
                status: order.status.to_string(),
            }));
        }

        let latest = self.payments.latest(&order).await?;
        if !retry_eligible(&latest, now) {
            return Err(SagaError::PaymentNotRetryable {
                status: latest.status,
            });
        }

        self.payments
            .create_replacement(&order, method.unwrap_or(latest.method), client_ip, now)
            .await
    }

    /// Operator refund for the latest payment of an order.
    ///
    /// Paid → Refunded, enforced by the ledger together with the eligibility
    /// window; this is the manual queue behind `refund_required`.
    #[tracing::instrument(skip(self))]
    pub async fn refund_payment(&self, order_id: common::OrderId) -> Result<domain::Payment> {
        let order = self.orders.load(order_id).await?;
        let payment = self.payments.latest(&order).await?;
        self.payments.refund(payment.id, Utc::now()).await
    }

    /// Cancels an order with its shipment and pending payment, best-effort.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: common::OrderId) -> Result<Order> {
        let order = self.orders.load(order_id).await?;

        if order.status == OrderStatus::Completed {
            return Err(SagaError::CancelForbidden {
                reason: "order already completed".to_string(),
            });
        }
        if order.is_paid && order.status == OrderStatus::Processing {
            return Err(SagaError::CancelForbidden {
                reason: "paid order already in fulfillment, operator action required".to_string(),
            });
        }

        self.update_status(order_id, OrderStatus::Cancelled).await
    }

    /// Syncs the shipment for an order from live carrier tracking.
    pub async fn sync_shipment_tracking(
        &self,
        order_id: common::OrderId,
    ) -> Result<(Shipping, bool)> {
        let shipping = self.shipments.load_for_order(order_id).await?;
        let code = shipping
            .carrier_order_code
            .ok_or(SagaError::ShipmentNotDispatched(order_id))?;
        self.shipments.sync_tracking(&code, Utc::now()).await
    }

    pub(crate) async fn complete_intent(&self, order: &Order) {
        match self.store.get_intent_for_order(order.id).await {
            Ok(Some(mut intent)) => {
                intent.complete(Utc::now());
                if let Err(e) = self.store.update_intent(&intent).await {
                    tracing::warn!(order_id = %order.id, error = %e, "failed to complete intent");
                }
            }
            Ok(None) => {
                tracing::warn!(order_id = %order.id, "no shipment intent found to complete")
            }
            Err(e) => tracing::warn!(order_id = %order.id, error = %e, "failed to load intent"),
        }
    }

    pub(crate) async fn record_intent_failure(&self, order: &Order, error: &SagaError) {
        match self.store.get_intent_for_order(order.id).await {
            Ok(Some(mut intent)) => {
                intent.record_failure(error.to_string(), Utc::now());
                if let Err(e) = self.store.update_intent(&intent).await {
                    tracing::warn!(order_id = %order.id, error = %e, "failed to record intent failure");
                }
            }
            Ok(None) => {
                tracing::warn!(order_id = %order.id, "no shipment intent found to record failure")
            }
            Err(e) => tracing::warn!(order_id = %order.id, error = %e, "failed to load intent"),
        }
    }
}

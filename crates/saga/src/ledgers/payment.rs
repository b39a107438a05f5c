//! Payment ledger.

use chrono::{DateTime, Duration, Utc};
use common::PaymentId;
use domain::{Order, Payment, PaymentMethod};
use gateway::VnpayGateway;
use store::{OrderStore, PaymentStore, StoreError};

use crate::error::{Result, SagaError};
use crate::ledgers::VERSION_RETRY_ATTEMPTS;
use crate::types::CallbackOutcome;

/// Minutes after which a Pending gateway payment is considered abandoned and
/// becomes retry-eligible.
pub const PAYMENT_STALENESS_MINUTES: i64 = 30;

/// A payment is retry-eligible when Failed, Cancelled, or Pending for longer
/// than the staleness window.
pub fn retry_eligible(payment: &Payment, now: DateTime<Utc>) -> bool {
    use domain::PaymentStatus::*;
    match payment.status {
        Failed | Cancelled => true,
        Pending => payment.is_stale_pending(now, Duration::minutes(PAYMENT_STALENESS_MINUTES)),
        Unpaid | Paid | Refunded => false,
    }
}

/// CRUD and state transitions over Payment records, plus the gateway flow.
pub struct PaymentLedger<S> {
    store: S,
    gateway: VnpayGateway,
}

impl<S> PaymentLedger<S>
where
    S: OrderStore + PaymentStore,
{
    /// Creates a new payment ledger.
    pub fn new(store: S, gateway: VnpayGateway) -> Self {
        Self { store, gateway }
    }

    /// Returns the gateway adapter.
    pub fn gateway(&self) -> &VnpayGateway {
        &self.gateway
    }

    /// Builds the initial payment for a new order. The caller persists it
    /// inside the order-creation transaction.
    pub fn build_initial(
        &self,
        order: &Order,
        method: PaymentMethod,
        now: DateTime<Utc>,
    ) -> Result<Payment> {
        Ok(Payment::new(
            order.id,
            method,
            order.total,
            order.order_number.clone(),
            now,
        )?)
    }

    /// The gateway redirect URL for a payment, when its method needs one.
    pub fn payment_url(&self, order: &Order, payment: &Payment, client_ip: &str) -> Option<String> {
        match payment.method {
            PaymentMethod::Gateway => Some(self.gateway.build_payment_url(
                &payment.txn_ref,
                payment.amount,
                &format!("Payment for order {}", order.order_number),
                client_ip,
                payment.created_at,
            )),
            PaymentMethod::Cod | PaymentMethod::Card => None,
        }
    }

    /// Cancels the active payment for an order, if one exists.
    ///
    /// Retries on version conflicts so that a racing webhook application
    /// wins and the cancel re-evaluates against the fresh state.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_active(&self, order: &Order, now: DateTime<Utc>) -> Result<Option<Payment>> {
        for _ in 0..VERSION_RETRY_ATTEMPTS {
            let Some(active) = self.store.active_payment_for_order(order.id).await? else {
                return Ok(None);
            };

            let mut cancelled = active.clone();
            cancelled.cancel(now);
            match self.store.update_payment(&cancelled).await {
                Ok(payment) => {
                    tracing::info!(order_id = %order.id, payment_id = %payment.id, "payment cancelled");
                    return Ok(Some(payment));
                }
                Err(StoreError::VersionConflict { .. }) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(SagaError::Store(StoreError::VersionConflict {
            entity: "payment",
            key: order.id.to_string(),
            expected: 0,
        }))
    }

    /// Creates a replacement payment for an order, enforcing the
    /// single-active-payment invariant: any still-active payment is cancelled
    /// first.
    #[tracing::instrument(skip(self))]
    pub async fn create_replacement(
        &self,
        order: &Order,
        method: PaymentMethod,
        client_ip: &str,
        now: DateTime<Utc>,
    ) -> Result<(Payment, Option<String>)> {
        self.cancel_active(order, now).await?;

        let payment = self.build_initial(order, method, now)?;
        self.store.insert_payment(&payment).await?;
        let url = self.payment_url(order, &payment, client_ip);

        metrics::counter!("payments_created_total").increment(1);
        Ok((payment, url))
    }

    /// The most recent payment for an order.
    pub async fn latest(&self, order: &Order) -> Result<Payment> {
        self.store
            .latest_payment_for_order(order.id)
            .await?
            .ok_or(SagaError::PaymentNotFound(order.id))
    }

    /// Applies a verified gateway callback.
    ///
    /// The target state is recomputed from the payload on every attempt, so
    /// at-least-once deliveries are idempotent: a duplicate lands in
    /// `AlreadyProcessed` and changes nothing. On success the parent order is
    /// marked paid with the gateway-reported pay date, preserving provenance.
    #[tracing::instrument(skip(self, callback), fields(txn_ref = %callback.txn_ref))]
    pub async fn apply_gateway_callback(
        &self,
        callback: &gateway::PaymentCallback,
        now: DateTime<Utc>,
    ) -> Result<CallbackOutcome> {
        let Some(order) = self.store.get_order_by_number(&callback.txn_ref).await? else {
            return Ok(CallbackOutcome::OrderUnknown);
        };

        for _ in 0..VERSION_RETRY_ATTEMPTS {
            let Some(payment) = self.store.latest_payment_for_order(order.id).await? else {
                return Ok(CallbackOutcome::OrderUnknown);
            };

            if callback.amount != payment.amount {
                return Ok(CallbackOutcome::AmountMismatch {
                    expected: payment.amount,
                    received: callback.amount,
                });
            }

            if !payment.status.is_active() {
                return Ok(CallbackOutcome::AlreadyProcessed { payment });
            }

            let paid = callback.is_success();
            let pay_date = callback.pay_date.unwrap_or(now);
            let mut updated = payment.clone();
            updated.apply_gateway_result(paid, callback.transaction_no.clone(), pay_date);

            match self.store.update_payment(&updated).await {
                Ok(payment) => {
                    if paid {
                        let mut order = order.clone();
                        order.mark_paid(pay_date);
                        self.store.update_order(&order).await?;
                        metrics::counter!("payments_settled_total").increment(1);
                    } else {
                        metrics::counter!("payments_failed_total").increment(1);
                    }
                    tracing::info!(
                        order_id = %order.id,
                        payment_id = %payment.id,
                        paid,
                        "gateway callback applied"
                    );
                    return Ok(CallbackOutcome::Applied { payment, paid });
                }
                Err(StoreError::VersionConflict { .. }) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(SagaError::Store(StoreError::VersionConflict {
            entity: "payment",
            key: callback.txn_ref.clone(),
            expected: 0,
        }))
    }

    /// Reconciles a COD payment to Paid when the order completes.
    pub async fn reconcile_cod(&self, order: &Order, now: DateTime<Utc>) -> Result<Option<Payment>> {
        for _ in 0..VERSION_RETRY_ATTEMPTS {
            let payment = self.latest(order).await?;
            if payment.method != PaymentMethod::Cod
                || payment.status != domain::PaymentStatus::Unpaid
            {
                return Ok(None);
            }

            let mut updated = payment.clone();
            updated.mark_paid(now);
            match self.store.update_payment(&updated).await {
                Ok(payment) => {
                    let mut paid_order = order.clone();
                    paid_order.mark_paid(now);
                    self.store.update_order(&paid_order).await?;
                    return Ok(Some(payment));
                }
                Err(StoreError::VersionConflict { .. }) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(None)
    }

    /// Flags a paid payment as requiring a refund (manual operator queue).
    pub async fn mark_refund_required(
        &self,
        payment: &Payment,
        now: DateTime<Utc>,
    ) -> Result<Payment> {
        let mut flagged = payment.clone();
        flagged.refund_required = true;
        flagged.updated_at = now;
        Ok(self.store.update_payment(&flagged).await?)
    }

    /// Operator refund: Paid → Refunded within the eligibility window.
    #[tracing::instrument(skip(self))]
    pub async fn refund(&self, payment_id: PaymentId, now: DateTime<Utc>) -> Result<Payment> {
        let payment = self
            .store
            .get_payment(payment_id)
            .await?
            .ok_or_else(|| {
                SagaError::Store(StoreError::NotFound {
                    entity: "payment",
                    key: payment_id.to_string(),
                })
            })?;

        let mut refunded = payment.clone();
        refunded.refund(now)?;
        let payment = self.store.update_payment(&refunded).await?;
        metrics::counter!("payments_refunded_total").increment(1);
        Ok(payment)
    }
}

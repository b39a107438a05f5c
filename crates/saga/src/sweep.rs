//! Background sweeps: shipment-intent retry and abandoned-payment cleanup.
//!
//! Both run on fixed intervals independent of request traffic; the binary
//! drives them from `tokio::time::interval` tasks.

use carrier::CarrierApi;
use chrono::{Duration, Utc};
use common::Money;
use domain::{OrderStatus, PaymentMethod};
use store::{FulfillmentStore, PaymentStore, ShipmentIntentStore, StoreError};

use crate::error::Result;
use crate::ledgers::payment::PAYMENT_STALENESS_MINUTES;
use crate::orchestrator::Orchestrator;
use crate::services::{CatalogService, NotificationService, VoucherService};

/// Carrier attempts before a shipment intent is abandoned to the operator.
pub const MAX_SHIPMENT_ATTEMPTS: u32 = 5;

/// Intents processed per sweep pass.
const SWEEP_BATCH: i64 = 50;

/// Result of one shipment-intent sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShipmentSweepStats {
    pub attempted: usize,
    pub dispatched: usize,
    pub abandoned: usize,
}

impl<S, C, Cat, V, N> Orchestrator<S, C, Cat, V, N>
where
    S: FulfillmentStore + Clone,
    C: CarrierApi,
    Cat: CatalogService,
    V: VoucherService,
    N: NotificationService,
{
    /// Retries carrier dispatch for every pending shipment intent.
    ///
    /// Intents whose order was cancelled, or whose retries are exhausted,
    /// are abandoned for operator attention.
    #[tracing::instrument(skip(self))]
    pub async fn sweep_pending_shipments(&self) -> Result<ShipmentSweepStats> {
        let now = Utc::now();
        let mut stats = ShipmentSweepStats::default();

        for mut intent in self.store().pending_intents(SWEEP_BATCH).await? {
            stats.attempted += 1;

            let order = match self.orders().load(intent.order_id).await {
                Ok(order) => order,
                Err(e) => {
                    tracing::warn!(order_id = %intent.order_id, error = %e, "intent without order");
                    intent.record_failure(e.to_string(), now);
                    intent.abandon(now);
                    self.store().update_intent(&intent).await?;
                    stats.abandoned += 1;
                    continue;
                }
            };

            if order.status == OrderStatus::Cancelled {
                intent.abandon(now);
                self.store().update_intent(&intent).await?;
                stats.abandoned += 1;
                continue;
            }

            let cod_amount = match self.payments().latest(&order).await {
                Ok(payment) if payment.method == PaymentMethod::Cod => order.total,
                _ => Money::zero(),
            };

            match self
                .shipments()
                .dispatch_to_carrier(&order, cod_amount, now)
                .await
            {
                Ok(_) => {
                    intent.complete(now);
                    self.store().update_intent(&intent).await?;
                    stats.dispatched += 1;
                    metrics::counter!("shipment_sweep_dispatched_total").increment(1);
                }
                Err(e) => {
                    tracing::warn!(order_id = %order.id, error = %e, "shipment retry failed");
                    intent.record_failure(e.to_string(), now);
                    if intent.attempts >= MAX_SHIPMENT_ATTEMPTS {
                        intent.abandon(now);
                        stats.abandoned += 1;
                        tracing::error!(
                            order_id = %order.id,
                            attempts = intent.attempts,
                            "shipment intent abandoned after exhausting retries"
                        );
                    }
                    self.store().update_intent(&intent).await?;
                }
            }
        }

        if stats.attempted > 0 {
            tracing::info!(
                attempted = stats.attempted,
                dispatched = stats.dispatched,
                abandoned = stats.abandoned,
                "shipment intent sweep complete"
            );
        }
        Ok(stats)
    }

    /// Cancels gateway payments stuck Pending beyond the staleness window.
    ///
    /// Returns how many were cancelled. Conflict losses are skipped: a
    /// racing webhook settling the payment wins.
    #[tracing::instrument(skip(self))]
    pub async fn sweep_stale_payments(&self) -> Result<u64> {
        let now = Utc::now();
        let cutoff = now - Duration::minutes(PAYMENT_STALENESS_MINUTES);
        let mut cancelled = 0;

        for payment in self.store().stale_pending_payments(cutoff).await? {
            let mut stale = payment.clone();
            stale.cancel(now);
            match self.store().update_payment(&stale).await {
                Ok(_) => {
                    cancelled += 1;
                    tracing::info!(payment_id = %payment.id, "stale pending payment cancelled");
                }
                Err(StoreError::VersionConflict { .. }) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        if cancelled > 0 {
            metrics::counter!("payments_swept_total").increment(cancelled);
        }
        Ok(cancelled)
    }
}

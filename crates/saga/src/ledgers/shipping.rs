//! Shipment ledger.

use carrier::{
    CarrierApi, CarrierItem, CreateOrderRequest, DEFAULT_ITEM_WEIGHT_GRAMS, FeeRequest,
};
use chrono::{DateTime, Utc};
use common::{Money, OrderId};
use domain::{Order, Recipient, Shipping, ShippingStatus};
use store::{ShipmentStore, StoreError};

use crate::error::{Result, SagaError};
use crate::ledgers::VERSION_RETRY_ATTEMPTS;

/// Total parcel weight for a set of lines, defaulting the per-item weight
/// when the catalog does not track one.
pub fn weight_for_lines(lines: &[domain::OrderLine]) -> u32 {
    lines
        .iter()
        .map(|line| line.quantity * DEFAULT_ITEM_WEIGHT_GRAMS)
        .sum()
}

/// A validated destination with its quoted fee.
#[derive(Debug, Clone)]
pub struct ShipmentQuote {
    pub district_id: i64,
    pub ward_code: String,
    pub fee: Money,
}

/// CRUD and state transitions over Shipping records, backed by the carrier.
pub struct ShipmentLedger<S, C> {
    store: S,
    carrier: C,
}

impl<S, C> ShipmentLedger<S, C>
where
    S: ShipmentStore,
    C: CarrierApi,
{
    /// Creates a new shipment ledger.
    pub fn new(store: S, carrier: C) -> Self {
        Self { store, carrier }
    }

    /// Returns the carrier adapter.
    pub fn carrier(&self) -> &C {
        &self.carrier
    }

    /// Validates the destination against the carrier hierarchy and quotes
    /// the shipping fee. Adapter failures propagate unmodified.
    #[tracing::instrument(skip(self, recipient))]
    pub async fn quote(&self, recipient: &Recipient, weight_grams: u32) -> Result<ShipmentQuote> {
        let (district_id, ward_code) = self
            .carrier
            .resolve_address(&recipient.province, &recipient.district, &recipient.ward)
            .await?;

        let fee = self
            .carrier
            .calculate_fee(&FeeRequest {
                to_district_id: district_id,
                to_ward_code: ward_code.clone(),
                weight_grams,
            })
            .await?;

        Ok(ShipmentQuote {
            district_id,
            ward_code,
            fee: fee.total,
        })
    }

    /// Loads the shipment for an order or fails with `ShipmentNotFound`.
    pub async fn load_for_order(&self, order_id: OrderId) -> Result<Shipping> {
        self.store
            .get_shipment_for_order(order_id)
            .await?
            .ok_or(SagaError::ShipmentNotFound(order_id))
    }

    /// Submits the carrier order for an existing (not yet dispatched)
    /// shipping record and persists the returned carrier order code, sort
    /// code, fee, and delivery estimate.
    ///
    /// Idempotent: a shipment that already carries a carrier order code is
    /// returned unchanged, so the retry sweep can never double-create.
    #[tracing::instrument(skip(self, order), fields(order_number = %order.order_number))]
    pub async fn dispatch_to_carrier(
        &self,
        order: &Order,
        cod_amount: Money,
        now: DateTime<Utc>,
    ) -> Result<Shipping> {
        let shipping = self.load_for_order(order.id).await?;
        if shipping.carrier_order_code.is_some() {
            return Ok(shipping);
        }

        let weight_grams = weight_for_lines(&order.lines);
        let quote = self.quote(&shipping.recipient, weight_grams).await?;

        let items = order
            .lines
            .iter()
            .map(|line| CarrierItem {
                name: line.name.clone(),
                quantity: line.quantity,
                weight_grams: DEFAULT_ITEM_WEIGHT_GRAMS,
            })
            .collect();

        let created = self
            .carrier
            .create_order(&CreateOrderRequest {
                to_name: shipping.recipient.name.clone(),
                to_phone: shipping.recipient.phone.clone(),
                to_address: shipping.recipient.address.clone(),
                to_district_id: quote.district_id,
                to_ward_code: quote.ward_code.clone(),
                cod_amount,
                weight_grams,
                items,
                client_order_code: order.order_number.clone(),
            })
            .await?;

        let mut dispatched = shipping;
        dispatched.carrier_order_code = Some(created.order_code.clone());
        dispatched.tracking_number = Some(created.order_code);
        dispatched.sort_code = created.sort_code;
        dispatched.fee = if created.fee.is_zero() {
            quote.fee
        } else {
            created.fee
        };
        dispatched.weight_grams = weight_grams;
        dispatched.expected_delivery = created.expected_delivery;
        dispatched.updated_at = now;

        let dispatched = self.store.update_shipment(&dispatched).await?;
        metrics::counter!("shipments_dispatched_total").increment(1);
        tracing::info!(
            order_id = %order.id,
            carrier_order_code = dispatched.carrier_order_code.as_deref().unwrap_or(""),
            "carrier order created"
        );
        Ok(dispatched)
    }

    /// Syncs a shipment from the carrier's current tracking status.
    ///
    /// Returns the record and whether it changed. A sync that maps to the
    /// already-stored status is a no-op, so at-least-once carrier callbacks
    /// are idempotent. Version conflicts re-read and recompute.
    #[tracing::instrument(skip(self))]
    pub async fn sync_tracking(
        &self,
        carrier_order_code: &str,
        now: DateTime<Utc>,
    ) -> Result<(Shipping, bool)> {
        let carrier_status = self.carrier.order_status(carrier_order_code).await?;
        let mapped = carrier_status.to_shipping_status();
        self.apply_status_by_code(carrier_order_code, mapped, now)
            .await
    }

    /// Applies an already-mapped status to the shipment with the given
    /// carrier order code (webhook path: the status comes from the payload,
    /// not a live carrier call).
    pub async fn apply_status_by_code(
        &self,
        carrier_order_code: &str,
        status: ShippingStatus,
        now: DateTime<Utc>,
    ) -> Result<(Shipping, bool)> {
        for _ in 0..VERSION_RETRY_ATTEMPTS {
            let shipping = self
                .store
                .get_shipment_by_carrier_code(carrier_order_code)
                .await?
                .ok_or_else(|| {
                    SagaError::Carrier(carrier::CarrierError::OrderNotFound(
                        carrier_order_code.to_string(),
                    ))
                })?;

            let mut updated = shipping.clone();
            if !updated.apply_status(status, now) {
                return Ok((shipping, false));
            }

            match self.store.update_shipment(&updated).await {
                Ok(shipping) => {
                    tracing::info!(carrier_order_code, status = %status, "shipment status updated");
                    return Ok((shipping, true));
                }
                Err(StoreError::VersionConflict { .. }) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(SagaError::Store(StoreError::VersionConflict {
            entity: "shipment",
            key: carrier_order_code.to_string(),
            expected: 0,
        }))
    }

    /// Applies a status directly by order id (orchestrator side effects).
    pub async fn apply_status_for_order(
        &self,
        order_id: OrderId,
        status: ShippingStatus,
        now: DateTime<Utc>,
    ) -> Result<(Shipping, bool)> {
        for _ in 0..VERSION_RETRY_ATTEMPTS {
            let shipping = self.load_for_order(order_id).await?;

            let mut updated = shipping.clone();
            if !updated.apply_status(status, now) {
                return Ok((shipping, false));
            }

            match self.store.update_shipment(&updated).await {
                Ok(shipping) => return Ok((shipping, true)),
                Err(StoreError::VersionConflict { .. }) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(SagaError::Store(StoreError::VersionConflict {
            entity: "shipment",
            key: order_id.to_string(),
            expected: 0,
        }))
    }

    /// Cancels the shipment for an order.
    ///
    /// The carrier-side cancel is best-effort (a failure is logged); the
    /// local record is always marked Cancelled.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_for_order(&self, order_id: OrderId, now: DateTime<Utc>) -> Result<Shipping> {
        let shipping = self.load_for_order(order_id).await?;

        if let Some(code) = shipping.carrier_order_code.as_deref()
            && let Err(e) = self.carrier.cancel_order(code).await
        {
            tracing::warn!(order_id = %order_id, error = %e, "carrier-side cancel failed");
        }

        let (shipping, _) = self
            .apply_status_for_order(order_id, ShippingStatus::Cancelled, now)
            .await?;
        Ok(shipping)
    }
}

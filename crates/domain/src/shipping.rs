//! Shipping record, status machine, and the shipment-intent outbox record.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, ShipmentId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// The status of a shipment, normalized from the carrier vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ShippingStatus {
    /// Created at the carrier, not yet picked up.
    #[default]
    Pending,

    /// Picked up and moving through the carrier network.
    Shipped,

    /// With the delivery driver.
    OutForDelivery,

    /// Delivered to the recipient (terminal).
    Delivered,

    /// Cancelled before pickup (terminal).
    Cancelled,

    /// Sent back to the seller (terminal).
    Returned,

    /// Lost or damaged in the carrier network (terminal).
    Failed,

    /// Carrier reported a status outside the known vocabulary.
    Unknown,
}

impl ShippingStatus {
    /// Returns true once the parcel has left the seller.
    pub fn is_in_transit(&self) -> bool {
        matches!(
            self,
            ShippingStatus::Shipped | ShippingStatus::OutForDelivery | ShippingStatus::Delivered
        )
    }

    /// Returns true if this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ShippingStatus::Delivered
                | ShippingStatus::Cancelled
                | ShippingStatus::Returned
                | ShippingStatus::Failed
        )
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ShippingStatus::Pending => "Pending",
            ShippingStatus::Shipped => "Shipped",
            ShippingStatus::OutForDelivery => "OutForDelivery",
            ShippingStatus::Delivered => "Delivered",
            ShippingStatus::Cancelled => "Cancelled",
            ShippingStatus::Returned => "Returned",
            ShippingStatus::Failed => "Failed",
            ShippingStatus::Unknown => "Unknown",
        }
    }

    /// Parses a status from its persisted name.
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        match value {
            "Pending" => Ok(ShippingStatus::Pending),
            "Shipped" => Ok(ShippingStatus::Shipped),
            "OutForDelivery" => Ok(ShippingStatus::OutForDelivery),
            "Delivered" => Ok(ShippingStatus::Delivered),
            "Cancelled" => Ok(ShippingStatus::Cancelled),
            "Returned" => Ok(ShippingStatus::Returned),
            "Failed" => Ok(ShippingStatus::Failed),
            "Unknown" => Ok(ShippingStatus::Unknown),
            other => Err(DomainError::UnknownValue {
                kind: "shipping status",
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for ShippingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Recipient address snapshot taken at order time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub name: String,
    pub phone: String,
    pub address: String,
    pub province: String,
    pub district: String,
    pub ward: String,
}

/// Shipping record.
///
/// `version` is the optimistic-concurrency column guarding duplicate webhook
/// deliveries racing on the same row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shipping {
    pub id: ShipmentId,
    pub order_id: OrderId,
    pub status: ShippingStatus,
    pub carrier_order_code: Option<String>,
    pub tracking_number: Option<String>,
    pub sort_code: Option<String>,
    pub fee: Money,
    pub weight_grams: u32,
    pub recipient: Recipient,
    pub expected_delivery: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Shipping {
    /// Creates a new pending shipment for an order.
    pub fn new(order_id: OrderId, recipient: Recipient, now: DateTime<Utc>) -> Self {
        Self {
            id: ShipmentId::new(),
            order_id,
            status: ShippingStatus::Pending,
            carrier_order_code: None,
            tracking_number: None,
            sort_code: None,
            fee: Money::zero(),
            weight_grams: 0,
            recipient,
            expected_delivery: None,
            shipped_at: None,
            delivered_at: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies a mapped carrier status.
    ///
    /// Returns false (and leaves the record untouched) when the status has
    /// not changed, so repeated tracking syncs are no-ops. `shipped_at` and
    /// `delivered_at` are stamped the first time those states are reached and
    /// never move afterwards.
    pub fn apply_status(&mut self, status: ShippingStatus, now: DateTime<Utc>) -> bool {
        if status == self.status {
            return false;
        }

        self.status = status;
        self.updated_at = now;
        if status.is_in_transit() && self.shipped_at.is_none() {
            self.shipped_at = Some(now);
        }
        if status == ShippingStatus::Delivered && self.delivered_at.is_none() {
            self.delivered_at = Some(now);
        }
        true
    }
}

/// Lifecycle of a shipment intent (the outbox record written before the
/// carrier call).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum IntentStatus {
    /// Carrier order not yet created; eligible for the retry sweep.
    #[default]
    Pending,

    /// Carrier order created, shipping record exists.
    Completed,

    /// Retries exhausted; requires operator attention.
    Abandoned,
}

impl IntentStatus {
    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentStatus::Pending => "Pending",
            IntentStatus::Completed => "Completed",
            IntentStatus::Abandoned => "Abandoned",
        }
    }

    /// Parses a status from its persisted name.
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        match value {
            "Pending" => Ok(IntentStatus::Pending),
            "Completed" => Ok(IntentStatus::Completed),
            "Abandoned" => Ok(IntentStatus::Abandoned),
            other => Err(DomainError::UnknownValue {
                kind: "intent status",
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for IntentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Shipment intent: persisted before the carrier call so that a failed
/// creation can be reconciled by the background sweep instead of being lost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentIntent {
    pub id: Uuid,
    pub order_id: OrderId,
    pub status: IntentStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ShipmentIntent {
    /// Creates a new pending intent for an order.
    pub fn new(order_id: OrderId, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            status: IntentStatus::Pending,
            attempts: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Records a failed carrier attempt.
    pub fn record_failure(&mut self, error: impl Into<String>, now: DateTime<Utc>) {
        self.attempts += 1;
        self.last_error = Some(error.into());
        self.updated_at = now;
    }

    /// Marks the intent complete.
    pub fn complete(&mut self, now: DateTime<Utc>) {
        self.status = IntentStatus::Completed;
        self.updated_at = now;
    }

    /// Marks the intent abandoned after retries are exhausted.
    pub fn abandon(&mut self, now: DateTime<Utc>) {
        self.status = IntentStatus::Abandoned;
        self.updated_at = now;
    }
}

//! Order record and status machine.

use chrono::{DateTime, Utc};
use common::{Money, OrderId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// The status of an order in its lifecycle.
///
/// Status transitions:
/// ```text
/// Pending ──► Processing ──► Completed
///    │             │
///    └─────────────┴──► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    /// Order has been placed, payment not yet confirmed.
    #[default]
    Pending,

    /// Payment confirmed (or COD), order is being fulfilled.
    Processing,

    /// Order has been delivered and closed (terminal status).
    Completed,

    /// Order was cancelled (terminal status).
    Cancelled,
}

impl OrderStatus {
    /// The allowed-transition table. Terminal statuses map to an empty slice.
    pub fn allowed_transitions(&self) -> &'static [OrderStatus] {
        match self {
            OrderStatus::Pending => &[OrderStatus::Processing, OrderStatus::Cancelled],
            OrderStatus::Processing => &[OrderStatus::Completed, OrderStatus::Cancelled],
            OrderStatus::Completed => &[],
            OrderStatus::Cancelled => &[],
        }
    }

    /// Returns true if the transition to `target` is allowed.
    pub fn can_transition_to(&self, target: OrderStatus) -> bool {
        self.allowed_transitions().contains(&target)
    }

    /// Returns true if this is a terminal status (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Processing => "Processing",
            OrderStatus::Completed => "Completed",
            OrderStatus::Cancelled => "Cancelled",
        }
    }

    /// Parses a status from its persisted name.
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        match value {
            "Pending" => Ok(OrderStatus::Pending),
            "Processing" => Ok(OrderStatus::Processing),
            "Completed" => Ok(OrderStatus::Completed),
            "Cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(DomainError::UnknownValue {
                kind: "order status",
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A line item: an immutable snapshot of the product at order time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    /// Product SKU.
    pub sku: String,

    /// Product name at order time.
    pub name: String,

    /// Unit price at order time.
    pub unit_price: Money,

    /// Quantity ordered.
    pub quantity: u32,
}

impl OrderLine {
    /// Creates a new line item snapshot.
    pub fn new(
        sku: impl Into<String>,
        name: impl Into<String>,
        unit_price: Money,
        quantity: u32,
    ) -> Self {
        Self {
            sku: sku.into(),
            name: name.into(),
            unit_price,
            quantity,
        }
    }

    /// Returns the total price for this line (quantity * unit_price).
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// Order record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub status: OrderStatus,
    pub subtotal: Money,
    pub shipping_fee: Money,
    pub discount: Money,
    pub total: Money,
    pub is_paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub canceled_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub voucher_code: Option<String>,
    pub lines: Vec<OrderLine>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Creates a new pending order from validated amounts.
    ///
    /// `total = subtotal + shipping_fee - discount`, floored at zero.
    pub fn new(
        order_number: String,
        lines: Vec<OrderLine>,
        shipping_fee: Money,
        discount: Money,
        voucher_code: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let subtotal: Money = lines.iter().map(OrderLine::line_total).sum();

        for (field, amount) in [
            ("subtotal", subtotal),
            ("shipping_fee", shipping_fee),
            ("discount", discount),
        ] {
            if amount.is_negative() {
                return Err(DomainError::NegativeAmount {
                    field,
                    cents: amount.cents(),
                });
            }
        }

        let total = (subtotal + shipping_fee).saturating_sub_floor(discount);

        Ok(Self {
            id: OrderId::new(),
            order_number,
            status: OrderStatus::Pending,
            subtotal,
            shipping_fee,
            discount,
            total,
            is_paid: false,
            paid_at: None,
            canceled_at: None,
            completed_at: None,
            voucher_code,
            lines,
            created_at: now,
            updated_at: now,
        })
    }

    /// Applies a status transition, enforcing the allowed-transition table.
    ///
    /// Stamps `completed_at` / `canceled_at` when entering the terminal
    /// statuses.
    pub fn transition_to(
        &mut self,
        target: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if self.status.is_terminal() {
            return Err(DomainError::TerminalStatus {
                status: self.status.to_string(),
            });
        }
        if !self.status.can_transition_to(target) {
            return Err(DomainError::InvalidTransition {
                from: self.status.to_string(),
                to: target.to_string(),
            });
        }

        self.status = target;
        self.updated_at = now;
        match target {
            OrderStatus::Completed => self.completed_at = Some(now),
            OrderStatus::Cancelled => self.canceled_at = Some(now),
            _ => {}
        }
        Ok(())
    }

    /// Marks the order paid with the gateway-reported pay date.
    pub fn mark_paid(&mut self, paid_at: DateTime<Utc>) {
        self.is_paid = true;
        self.paid_at = Some(paid_at);
        self.updated_at = paid_at;
    }
}

/// Generates a unique human-readable order number, e.g. `ORD-20260806-9F4A2C1B`.
pub fn generate_order_number(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "ORD-{}-{}",
        now.format("%Y%m%d"),
        suffix[..8].to_uppercase()
    )
}

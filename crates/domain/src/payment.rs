//! Payment record and status machine.

use chrono::{DateTime, Duration, Utc};
use common::{Money, OrderId, PaymentId};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Days after `paid_at` during which a refund may still be issued.
pub const PAYMENT_REFUND_WINDOW_DAYS: i64 = 30;

/// How a payment is collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    /// Cash on delivery; reconciled when the order completes.
    Cod,

    /// Redirect-based payment gateway.
    Gateway,

    /// Card captured out of band.
    Card,
}

impl PaymentMethod {
    /// Returns the method name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cod => "Cod",
            PaymentMethod::Gateway => "Gateway",
            PaymentMethod::Card => "Card",
        }
    }

    /// Parses a method from its persisted name.
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        match value {
            "Cod" => Ok(PaymentMethod::Cod),
            "Gateway" => Ok(PaymentMethod::Gateway),
            "Card" => Ok(PaymentMethod::Card),
            other => Err(DomainError::UnknownValue {
                kind: "payment method",
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The status of a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PaymentStatus {
    /// Awaiting collection (COD/card) — still counts as active.
    #[default]
    Unpaid,

    /// Gateway flow started, awaiting the callback.
    Pending,

    /// Funds confirmed.
    Paid,

    /// Gateway reported failure.
    Failed,

    /// Superseded or withdrawn.
    Cancelled,

    /// Reversed after being paid.
    Refunded,
}

impl PaymentStatus {
    /// Active payments block creation of a new one for the same order.
    pub fn is_active(&self) -> bool {
        matches!(self, PaymentStatus::Unpaid | PaymentStatus::Pending)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "Unpaid",
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Paid => "Paid",
            PaymentStatus::Failed => "Failed",
            PaymentStatus::Cancelled => "Cancelled",
            PaymentStatus::Refunded => "Refunded",
        }
    }

    /// Parses a status from its persisted name.
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        match value {
            "Unpaid" => Ok(PaymentStatus::Unpaid),
            "Pending" => Ok(PaymentStatus::Pending),
            "Paid" => Ok(PaymentStatus::Paid),
            "Failed" => Ok(PaymentStatus::Failed),
            "Cancelled" => Ok(PaymentStatus::Cancelled),
            "Refunded" => Ok(PaymentStatus::Refunded),
            other => Err(DomainError::UnknownValue {
                kind: "payment status",
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payment record.
///
/// `version` is the optimistic-concurrency column guarding duplicate webhook
/// deliveries racing on the same row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub amount: Money,
    pub txn_ref: String,
    pub gateway_txn_no: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub refund_required: bool,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Creates a new payment for an order.
    ///
    /// Gateway payments start Pending (awaiting the callback); COD and card
    /// start Unpaid.
    pub fn new(
        order_id: OrderId,
        method: PaymentMethod,
        amount: Money,
        txn_ref: String,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if amount.is_negative() {
            return Err(DomainError::NegativeAmount {
                field: "payment amount",
                cents: amount.cents(),
            });
        }

        let status = match method {
            PaymentMethod::Gateway => PaymentStatus::Pending,
            PaymentMethod::Cod | PaymentMethod::Card => PaymentStatus::Unpaid,
        };

        Ok(Self {
            id: PaymentId::new(),
            order_id,
            method,
            status,
            amount,
            txn_ref,
            gateway_txn_no: None,
            paid_at: None,
            refund_required: false,
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Records the gateway outcome: Paid or Failed, with the gateway's
    /// transaction number and reported pay date.
    pub fn apply_gateway_result(
        &mut self,
        paid: bool,
        gateway_txn_no: Option<String>,
        pay_date: DateTime<Utc>,
    ) {
        self.status = if paid {
            PaymentStatus::Paid
        } else {
            PaymentStatus::Failed
        };
        self.gateway_txn_no = gateway_txn_no;
        if paid {
            self.paid_at = Some(pay_date);
        }
        self.updated_at = pay_date;
    }

    /// Marks the payment cancelled (superseded by a retry, or order cancel).
    pub fn cancel(&mut self, now: DateTime<Utc>) {
        self.status = PaymentStatus::Cancelled;
        self.updated_at = now;
    }

    /// Reconciles a COD payment when the order completes.
    pub fn mark_paid(&mut self, now: DateTime<Utc>) {
        self.status = PaymentStatus::Paid;
        self.paid_at = Some(now);
        self.updated_at = now;
    }

    /// Moves Paid → Refunded, enforcing the eligibility window.
    pub fn refund(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        if self.status != PaymentStatus::Paid {
            return Err(DomainError::RefundNotPaid {
                status: self.status.to_string(),
            });
        }
        let paid_at = self.paid_at.unwrap_or(self.created_at);
        if now - paid_at > Duration::days(PAYMENT_REFUND_WINDOW_DAYS) {
            return Err(DomainError::RefundWindowExpired {
                window_days: PAYMENT_REFUND_WINDOW_DAYS,
            });
        }

        self.status = PaymentStatus::Refunded;
        self.refund_required = false;
        self.updated_at = now;
        Ok(())
    }

    /// Returns true if the payment is stale-pending at `now`.
    pub fn is_stale_pending(&self, now: DateTime<Utc>, staleness: Duration) -> bool {
        self.status == PaymentStatus::Pending && now - self.created_at > staleness
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 6, 12, 0, 0).unwrap()
    }

    fn gateway_payment() -> Payment {
        Payment::new(
            OrderId::new(),
            PaymentMethod::Gateway,
            Money::from_cents(5000),
            "ORD-1".to_string(),
            now(),
        )
        .unwrap()
    }

    #[test]
    fn test_gateway_payment_starts_pending() {
        assert_eq!(gateway_payment().status, PaymentStatus::Pending);
    }

    #[test]
    fn test_cod_payment_starts_unpaid() {
        let payment = Payment::new(
            OrderId::new(),
            PaymentMethod::Cod,
            Money::from_cents(5000),
            "ORD-2".to_string(),
            now(),
        )
        .unwrap();
        assert_eq!(payment.status, PaymentStatus::Unpaid);
    }

    #[test]
    fn test_active_statuses() {
        assert!(PaymentStatus::Unpaid.is_active());
        assert!(PaymentStatus::Pending.is_active());
        assert!(!PaymentStatus::Paid.is_active());
        assert!(!PaymentStatus::Failed.is_active());
        assert!(!PaymentStatus::Cancelled.is_active());
        assert!(!PaymentStatus::Refunded.is_active());
    }

    #[test]
    fn test_apply_gateway_result_paid() {
        let mut payment = gateway_payment();
        let pay_date = Utc.with_ymd_and_hms(2026, 8, 6, 12, 5, 0).unwrap();
        payment.apply_gateway_result(true, Some("14600001".to_string()), pay_date);

        assert_eq!(payment.status, PaymentStatus::Paid);
        assert_eq!(payment.paid_at, Some(pay_date));
        assert_eq!(payment.gateway_txn_no.as_deref(), Some("14600001"));
    }

    #[test]
    fn test_apply_gateway_result_failed_leaves_paid_at_empty() {
        let mut payment = gateway_payment();
        payment.apply_gateway_result(false, Some("14600002".to_string()), now());

        assert_eq!(payment.status, PaymentStatus::Failed);
        assert!(payment.paid_at.is_none());
    }

    #[test]
    fn test_refund_within_window() {
        let mut payment = gateway_payment();
        payment.apply_gateway_result(true, None, now());

        let later = now() + Duration::days(10);
        payment.refund(later).unwrap();
        assert_eq!(payment.status, PaymentStatus::Refunded);
    }

    #[test]
    fn test_refund_after_window_rejected() {
        let mut payment = gateway_payment();
        payment.apply_gateway_result(true, None, now());

        let later = now() + Duration::days(31);
        let result = payment.refund(later);
        assert!(matches!(result, Err(DomainError::RefundWindowExpired { .. })));
        assert_eq!(payment.status, PaymentStatus::Paid);
    }

    #[test]
    fn test_refund_requires_paid() {
        let mut payment = gateway_payment();
        let result = payment.refund(now());
        assert!(matches!(result, Err(DomainError::RefundNotPaid { .. })));
    }

    #[test]
    fn test_stale_pending() {
        let payment = gateway_payment();
        let staleness = Duration::minutes(30);

        assert!(!payment.is_stale_pending(now() + Duration::minutes(10), staleness));
        assert!(payment.is_stale_pending(now() + Duration::minutes(31), staleness));
    }

    #[test]
    fn test_method_parse_roundtrip() {
        for method in [PaymentMethod::Cod, PaymentMethod::Gateway, PaymentMethod::Card] {
            assert_eq!(PaymentMethod::parse(method.as_str()).unwrap(), method);
        }
        assert!(PaymentMethod::parse("Wire").is_err());
    }

    #[test]
    fn test_status_parse_roundtrip() {
        for status in [
            PaymentStatus::Unpaid,
            PaymentStatus::Pending,
            PaymentStatus::Paid,
            PaymentStatus::Failed,
            PaymentStatus::Cancelled,
            PaymentStatus::Refunded,
        ] {
            assert_eq!(PaymentStatus::parse(status.as_str()).unwrap(), status);
        }
    }
}

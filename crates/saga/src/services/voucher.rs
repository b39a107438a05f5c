//! Voucher service trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::Money;

use crate::error::SagaError;

/// How a voucher reduces the subtotal.
#[derive(Debug, Clone, Copy)]
enum VoucherKind {
    /// Percentage of the subtotal.
    Percent(u32),
    /// Fixed amount.
    Fixed(Money),
}

#[derive(Debug, Clone)]
struct VoucherRecord {
    kind: VoucherKind,
    min_subtotal: Money,
    usage_limit: u32,
    used: u32,
}

/// Trait for voucher validation and usage accounting.
///
/// The discount is always recomputed here, server-side; callers never get to
/// dictate it.
#[async_trait]
pub trait VoucherService: Send + Sync {
    /// Recomputes the discount a voucher grants on `subtotal`.
    ///
    /// Fails with `VoucherInvalid` when the code is unknown, exhausted, or
    /// the subtotal does not qualify.
    async fn compute_discount(&self, code: &str, subtotal: Money) -> Result<Money, SagaError>;

    /// Increments the voucher's usage counter.
    async fn increment_usage(&self, code: &str) -> Result<(), SagaError>;
}

/// In-memory voucher service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryVoucherService {
    vouchers: Arc<RwLock<HashMap<String, VoucherRecord>>>,
}

impl InMemoryVoucherService {
    /// Creates an empty voucher book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a percentage voucher.
    pub fn add_percent_voucher(&self, code: &str, percent: u32, min_subtotal: Money, limit: u32) {
        self.vouchers.write().unwrap().insert(
            code.to_string(),
            VoucherRecord {
                kind: VoucherKind::Percent(percent),
                min_subtotal,
                usage_limit: limit,
                used: 0,
            },
        );
    }

    /// Registers a fixed-amount voucher.
    pub fn add_fixed_voucher(&self, code: &str, amount: Money, min_subtotal: Money, limit: u32) {
        self.vouchers.write().unwrap().insert(
            code.to_string(),
            VoucherRecord {
                kind: VoucherKind::Fixed(amount),
                min_subtotal,
                usage_limit: limit,
                used: 0,
            },
        );
    }

    /// Returns how many times a voucher has been used.
    pub fn usage_count(&self, code: &str) -> Option<u32> {
        self.vouchers.read().unwrap().get(code).map(|v| v.used)
    }
}

#[async_trait]
impl VoucherService for InMemoryVoucherService {
    async fn compute_discount(&self, code: &str, subtotal: Money) -> Result<Money, SagaError> {
        let vouchers = self.vouchers.read().unwrap();
        let voucher = vouchers.get(code).ok_or_else(|| SagaError::VoucherInvalid {
            code: code.to_string(),
            reason: "unknown code".to_string(),
        })?;

        if voucher.used >= voucher.usage_limit {
            return Err(SagaError::VoucherInvalid {
                code: code.to_string(),
                reason: "usage limit reached".to_string(),
            });
        }
        if subtotal < voucher.min_subtotal {
            return Err(SagaError::VoucherInvalid {
                code: code.to_string(),
                reason: format!("subtotal below minimum {}", voucher.min_subtotal),
            });
        }

        let discount = match voucher.kind {
            VoucherKind::Percent(pct) => {
                Money::from_cents(subtotal.cents() * pct as i64 / 100)
            }
            VoucherKind::Fixed(amount) => amount,
        };
        // A voucher never discounts below zero total.
        Ok(if discount > subtotal { subtotal } else { discount })
    }

    async fn increment_usage(&self, code: &str) -> Result<(), SagaError> {
        let mut vouchers = self.vouchers.write().unwrap();
        let voucher = vouchers
            .get_mut(code)
            .ok_or_else(|| SagaError::VoucherInvalid {
                code: code.to_string(),
                reason: "unknown code".to_string(),
            })?;
        voucher.used += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_percent_discount() {
        let vouchers = InMemoryVoucherService::new();
        vouchers.add_percent_voucher("SALE10", 10, Money::zero(), 100);

        let discount = vouchers
            .compute_discount("SALE10", Money::from_cents(5000))
            .await
            .unwrap();
        assert_eq!(discount.cents(), 500);
    }

    #[tokio::test]
    async fn test_fixed_discount_capped_at_subtotal() {
        let vouchers = InMemoryVoucherService::new();
        vouchers.add_fixed_voucher("FLAT50", Money::from_cents(5000), Money::zero(), 100);

        let discount = vouchers
            .compute_discount("FLAT50", Money::from_cents(3000))
            .await
            .unwrap();
        assert_eq!(discount.cents(), 3000);
    }

    #[tokio::test]
    async fn test_min_subtotal_enforced() {
        let vouchers = InMemoryVoucherService::new();
        vouchers.add_percent_voucher("BIG", 20, Money::from_cents(10_000), 100);

        let result = vouchers.compute_discount("BIG", Money::from_cents(5000)).await;
        assert!(matches!(result, Err(SagaError::VoucherInvalid { .. })));
    }

    #[tokio::test]
    async fn test_usage_limit() {
        let vouchers = InMemoryVoucherService::new();
        vouchers.add_percent_voucher("ONCE", 10, Money::zero(), 1);

        vouchers.increment_usage("ONCE").await.unwrap();
        assert_eq!(vouchers.usage_count("ONCE"), Some(1));

        let result = vouchers.compute_discount("ONCE", Money::from_cents(1000)).await;
        assert!(matches!(result, Err(SagaError::VoucherInvalid { .. })));
    }

    #[tokio::test]
    async fn test_unknown_code() {
        let vouchers = InMemoryVoucherService::new();
        let result = vouchers.compute_discount("NOPE", Money::from_cents(1000)).await;
        assert!(matches!(result, Err(SagaError::VoucherInvalid { .. })));
    }
}

//! Notification dispatch trait and in-memory implementation.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use domain::Order;

use crate::error::SagaError;

/// Trait for customer notification dispatch.
///
/// Dispatch is always best-effort: the orchestrator logs failures and never
/// rolls back on them.
#[async_trait]
pub trait NotificationService: Send + Sync {
    /// Notifies the customer about an order status change.
    async fn order_status_changed(&self, order: &Order) -> Result<(), SagaError>;
}

#[derive(Debug, Default)]
struct InMemoryNotificationState {
    sent: Vec<(String, String)>,
    fail_on_send: bool,
}

/// In-memory notification sink for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotificationService {
    state: Arc<RwLock<InMemoryNotificationState>>,
}

impl InMemoryNotificationService {
    /// Creates a new notification sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the sink to fail sends.
    pub fn set_fail_on_send(&self, fail: bool) {
        self.state.write().unwrap().fail_on_send = fail;
    }

    /// Returns the number of notifications sent.
    pub fn sent_count(&self) -> usize {
        self.state.read().unwrap().sent.len()
    }

    /// Returns the (order number, status) pairs sent so far.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.state.read().unwrap().sent.clone()
    }
}

#[async_trait]
impl NotificationService for InMemoryNotificationService {
    async fn order_status_changed(&self, order: &Order) -> Result<(), SagaError> {
        let mut state = self.state.write().unwrap();
        if state.fail_on_send {
            return Err(SagaError::Collaborator {
                service: "notification",
                message: "dispatch failed".to_string(),
            });
        }
        state
            .sent
            .push((order.order_number.clone(), order.status.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::Money;
    use domain::OrderLine;

    fn order() -> Order {
        Order::new(
            "ORD-1".to_string(),
            vec![OrderLine::new("SKU-001", "Widget", Money::from_cents(1000), 1)],
            Money::zero(),
            Money::zero(),
            None,
            Utc::now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_records_notifications() {
        let sink = InMemoryNotificationService::new();
        sink.order_status_changed(&order()).await.unwrap();

        assert_eq!(sink.sent_count(), 1);
        assert_eq!(sink.sent()[0].1, "Pending");
    }

    #[tokio::test]
    async fn test_fail_on_send() {
        let sink = InMemoryNotificationService::new();
        sink.set_fail_on_send(true);
        assert!(sink.order_status_changed(&order()).await.is_err());
        assert_eq!(sink.sent_count(), 0);
    }
}

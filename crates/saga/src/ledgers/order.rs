//! Order ledger.

use chrono::{DateTime, Utc};
use common::OrderId;
use domain::{Order, OrderStatus};
use store::OrderStore;

use crate::error::{Result, SagaError};

/// CRUD and status transitions over Order records.
///
/// The allowed-transition table itself lives on `OrderStatus`; the ledger
/// enforces it on every persisted transition.
pub struct OrderLedger<S> {
    store: S,
}

impl<S: OrderStore> OrderLedger<S> {
    /// Creates a new order ledger.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Loads an order or fails with `OrderNotFound`.
    pub async fn load(&self, order_id: OrderId) -> Result<Order> {
        self.store
            .get_order(order_id)
            .await?
            .ok_or(SagaError::OrderNotFound(order_id))
    }

    /// Loads an order by its human-readable number.
    pub async fn load_by_number(&self, order_number: &str) -> Result<Order> {
        self.store
            .get_order_by_number(order_number)
            .await?
            .ok_or_else(|| SagaError::OrderNumberNotFound(order_number.to_string()))
    }

    /// Applies and persists a status transition.
    #[tracing::instrument(skip(self))]
    pub async fn transition(
        &self,
        order_id: OrderId,
        target: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<Order> {
        let mut order = self.load(order_id).await?;
        order.transition_to(target, now)?;
        self.store.update_order(&order).await?;
        tracing::info!(%order_id, status = %target, "order status updated");
        Ok(order)
    }

    /// Marks an order paid with the gateway-reported pay date.
    ///
    /// Idempotent: an already-paid order is returned unchanged.
    pub async fn mark_paid(&self, order_id: OrderId, paid_at: DateTime<Utc>) -> Result<Order> {
        let mut order = self.load(order_id).await?;
        if order.is_paid {
            return Ok(order);
        }
        order.mark_paid(paid_at);
        self.store.update_order(&order).await?;
        Ok(order)
    }
}

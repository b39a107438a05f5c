//! PostgreSQL-backed store implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{Money, OrderId, PaymentId, ShipmentId};
use domain::{
    IntentStatus, Order, OrderLine, OrderStatus, Payment, PaymentMethod, PaymentStatus, Recipient,
    ShipmentIntent, Shipping, ShippingStatus,
};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::Result;
use crate::error::StoreError;
use crate::repository::{
    OrderStore, PaymentStore, ShipmentIntentStore, ShipmentStore, WebhookEventStore,
};
use crate::webhook::{WebhookEventFilter, WebhookEventRecord, WebhookSource};

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_order(row: &PgRow, lines: Vec<OrderLine>) -> Result<Order> {
        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            order_number: row.try_get("order_number")?,
            status: OrderStatus::parse(row.try_get::<String, _>("status")?.as_str())?,
            subtotal: Money::from_cents(row.try_get("subtotal_cents")?),
            shipping_fee: Money::from_cents(row.try_get("shipping_fee_cents")?),
            discount: Money::from_cents(row.try_get("discount_cents")?),
            total: Money::from_cents(row.try_get("total_cents")?),
            is_paid: row.try_get("is_paid")?,
            paid_at: row.try_get("paid_at")?,
            canceled_at: row.try_get("canceled_at")?,
            completed_at: row.try_get("completed_at")?,
            voucher_code: row.try_get("voucher_code")?,
            lines,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_line(row: &PgRow) -> Result<OrderLine> {
        Ok(OrderLine {
            sku: row.try_get("sku")?,
            name: row.try_get("name")?,
            unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
            quantity: row.try_get::<i32, _>("quantity")? as u32,
        })
    }

    fn row_to_payment(row: &PgRow) -> Result<Payment> {
        Ok(Payment {
            id: PaymentId::from_uuid(row.try_get::<Uuid, _>("id")?),
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            method: PaymentMethod::parse(row.try_get::<String, _>("method")?.as_str())?,
            status: PaymentStatus::parse(row.try_get::<String, _>("status")?.as_str())?,
            amount: Money::from_cents(row.try_get("amount_cents")?),
            txn_ref: row.try_get("txn_ref")?,
            gateway_txn_no: row.try_get("gateway_txn_no")?,
            paid_at: row.try_get("paid_at")?,
            refund_required: row.try_get("refund_required")?,
            version: row.try_get("version")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_shipment(row: &PgRow) -> Result<Shipping> {
        Ok(Shipping {
            id: ShipmentId::from_uuid(row.try_get::<Uuid, _>("id")?),
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            status: ShippingStatus::parse(row.try_get::<String, _>("status")?.as_str())?,
            carrier_order_code: row.try_get("carrier_order_code")?,
            tracking_number: row.try_get("tracking_number")?,
            sort_code: row.try_get("sort_code")?,
            fee: Money::from_cents(row.try_get("fee_cents")?),
            weight_grams: row.try_get::<i32, _>("weight_grams")? as u32,
            recipient: Recipient {
                name: row.try_get("recipient_name")?,
                phone: row.try_get("recipient_phone")?,
                address: row.try_get("recipient_address")?,
                province: row.try_get("recipient_province")?,
                district: row.try_get("recipient_district")?,
                ward: row.try_get("recipient_ward")?,
            },
            expected_delivery: row.try_get("expected_delivery")?,
            shipped_at: row.try_get("shipped_at")?,
            delivered_at: row.try_get("delivered_at")?,
            version: row.try_get("version")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_intent(row: &PgRow) -> Result<ShipmentIntent> {
        Ok(ShipmentIntent {
            id: row.try_get("id")?,
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            status: IntentStatus::parse(row.try_get::<String, _>("status")?.as_str())?,
            attempts: row.try_get::<i32, _>("attempts")? as u32,
            last_error: row.try_get("last_error")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_webhook_event(row: &PgRow) -> Result<WebhookEventRecord> {
        Ok(WebhookEventRecord {
            id: row.try_get("id")?,
            source: WebhookSource::parse(row.try_get::<String, _>("source")?.as_str())?,
            order_ref: row.try_get("order_ref")?,
            response_code: row.try_get("response_code")?,
            duration_ms: row.try_get::<i64, _>("duration_ms")?.max(0) as u64,
            success: row.try_get("success")?,
            error: row.try_get("error")?,
            metadata: row.try_get("metadata")?,
            source_ip: row.try_get("source_ip")?,
            user_agent: row.try_get("user_agent")?,
            webhook_id: row.try_get("webhook_id")?,
            received_at: row.try_get("received_at")?,
        })
    }

    async fn load_lines(&self, order_id: OrderId) -> Result<Vec<OrderLine>> {
        let rows = sqlx::query(
            "SELECT sku, name, unit_price_cents, quantity FROM order_lines WHERE order_id = $1 ORDER BY sku",
        )
        .bind(order_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_line).collect()
    }
}

const SELECT_PAYMENT: &str = "SELECT id, order_id, method, status, amount_cents, txn_ref, \
     gateway_txn_no, paid_at, refund_required, version, created_at, updated_at FROM payments";

const SELECT_SHIPMENT: &str = "SELECT id, order_id, status, carrier_order_code, tracking_number, \
     sort_code, fee_cents, weight_grams, recipient_name, recipient_phone, recipient_address, \
     recipient_province, recipient_district, recipient_ward, expected_delivery, shipped_at, \
     delivered_at, version, created_at, updated_at FROM shipments";

const SELECT_INTENT: &str =
    "SELECT id, order_id, status, attempts, last_error, created_at, updated_at FROM shipment_intents";

const SELECT_WEBHOOK_EVENT: &str = "SELECT id, source, order_ref, response_code, duration_ms, \
     success, error, metadata, source_ip, user_agent, webhook_id, received_at FROM webhook_events";

#[async_trait]
impl OrderStore for PostgresStore {
    async fn create_order(
        &self,
        order: &Order,
        payment: &Payment,
        intent: &ShipmentIntent,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, order_number, status, subtotal_cents, shipping_fee_cents,
                discount_cents, total_cents, is_paid, paid_at, canceled_at, completed_at,
                voucher_code, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(&order.order_number)
        .bind(order.status.as_str())
        .bind(order.subtotal.cents())
        .bind(order.shipping_fee.cents())
        .bind(order.discount.cents())
        .bind(order.total.cents())
        .bind(order.is_paid)
        .bind(order.paid_at)
        .bind(order.canceled_at)
        .bind(order.completed_at)
        .bind(&order.voucher_code)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("orders_order_number_key")
            {
                return StoreError::Duplicate {
                    entity: "order",
                    key: order.order_number.clone(),
                };
            }
            StoreError::Database(e)
        })?;

        for line in &order.lines {
            sqlx::query(
                r#"
                INSERT INTO order_lines (order_id, sku, name, unit_price_cents, quantity)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(order.id.as_uuid())
            .bind(&line.sku)
            .bind(&line.name)
            .bind(line.unit_price.cents())
            .bind(line.quantity as i32)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            r#"
            INSERT INTO payments (id, order_id, method, status, amount_cents, txn_ref,
                gateway_txn_no, paid_at, refund_required, version, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(payment.id.as_uuid())
        .bind(payment.order_id.as_uuid())
        .bind(payment.method.as_str())
        .bind(payment.status.as_str())
        .bind(payment.amount.cents())
        .bind(&payment.txn_ref)
        .bind(&payment.gateway_txn_no)
        .bind(payment.paid_at)
        .bind(payment.refund_required)
        .bind(payment.version)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO shipment_intents (id, order_id, status, attempts, last_error,
                created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(intent.id)
        .bind(intent.order_id.as_uuid())
        .bind(intent.status.as_str())
        .bind(intent.attempts as i32)
        .bind(&intent.last_error)
        .bind(intent.created_at)
        .bind(intent.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query("SELECT * FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let lines = self.load_lines(id).await?;
                Ok(Some(Self::row_to_order(&row, lines)?))
            }
            None => Ok(None),
        }
    }

    async fn get_order_by_number(&self, order_number: &str) -> Result<Option<Order>> {
        let row = sqlx::query("SELECT * FROM orders WHERE order_number = $1")
            .bind(order_number)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let id = OrderId::from_uuid(row.try_get::<Uuid, _>("id")?);
                let lines = self.load_lines(id).await?;
                Ok(Some(Self::row_to_order(&row, lines)?))
            }
            None => Ok(None),
        }
    }

    async fn update_order(&self, order: &Order) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, is_paid = $3, paid_at = $4, canceled_at = $5,
                completed_at = $6, updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.status.as_str())
        .bind(order.is_paid)
        .bind(order.paid_at)
        .bind(order.canceled_at)
        .bind(order.completed_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "order",
                key: order.id.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PaymentStore for PostgresStore {
    async fn insert_payment(&self, payment: &Payment) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO payments (id, order_id, method, status, amount_cents, txn_ref,
                gateway_txn_no, paid_at, refund_required, version, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(payment.id.as_uuid())
        .bind(payment.order_id.as_uuid())
        .bind(payment.method.as_str())
        .bind(payment.status.as_str())
        .bind(payment.amount.cents())
        .bind(&payment.txn_ref)
        .bind(&payment.gateway_txn_no)
        .bind(payment.paid_at)
        .bind(payment.refund_required)
        .bind(payment.version)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_payment(&self, id: PaymentId) -> Result<Option<Payment>> {
        let row = sqlx::query(&format!("{SELECT_PAYMENT} WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_payment).transpose()
    }

    async fn latest_payment_for_order(&self, order_id: OrderId) -> Result<Option<Payment>> {
        let row = sqlx::query(&format!(
            "{SELECT_PAYMENT} WHERE order_id = $1 ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(order_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_payment).transpose()
    }

    async fn active_payment_for_order(&self, order_id: OrderId) -> Result<Option<Payment>> {
        let row = sqlx::query(&format!(
            "{SELECT_PAYMENT} WHERE order_id = $1 AND status IN ('Unpaid', 'Pending') \
             ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(order_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_payment).transpose()
    }

    async fn update_payment(&self, payment: &Payment) -> Result<Payment> {
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = $2, gateway_txn_no = $3, paid_at = $4, refund_required = $5,
                updated_at = $6, version = version + 1
            WHERE id = $1 AND version = $7
            "#,
        )
        .bind(payment.id.as_uuid())
        .bind(payment.status.as_str())
        .bind(&payment.gateway_txn_no)
        .bind(payment.paid_at)
        .bind(payment.refund_required)
        .bind(payment.updated_at)
        .bind(payment.version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let exists = sqlx::query("SELECT 1 FROM payments WHERE id = $1")
                .bind(payment.id.as_uuid())
                .fetch_optional(&self.pool)
                .await?
                .is_some();

            return Err(if exists {
                StoreError::VersionConflict {
                    entity: "payment",
                    key: payment.id.to_string(),
                    expected: payment.version,
                }
            } else {
                StoreError::NotFound {
                    entity: "payment",
                    key: payment.id.to_string(),
                }
            });
        }

        let mut updated = payment.clone();
        updated.version += 1;
        Ok(updated)
    }

    async fn stale_pending_payments(&self, cutoff: DateTime<Utc>) -> Result<Vec<Payment>> {
        let rows = sqlx::query(&format!(
            "{SELECT_PAYMENT} WHERE status = 'Pending' AND created_at < $1 ORDER BY created_at"
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_payment).collect()
    }
}

#[async_trait]
impl ShipmentStore for PostgresStore {
    async fn insert_shipment(&self, shipping: &Shipping) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO shipments (id, order_id, status, carrier_order_code, tracking_number,
                sort_code, fee_cents, weight_grams, recipient_name, recipient_phone,
                recipient_address, recipient_province, recipient_district, recipient_ward,
                expected_delivery, shipped_at, delivered_at, version, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                $17, $18, $19, $20)
            "#,
        )
        .bind(shipping.id.as_uuid())
        .bind(shipping.order_id.as_uuid())
        .bind(shipping.status.as_str())
        .bind(&shipping.carrier_order_code)
        .bind(&shipping.tracking_number)
        .bind(&shipping.sort_code)
        .bind(shipping.fee.cents())
        .bind(shipping.weight_grams as i32)
        .bind(&shipping.recipient.name)
        .bind(&shipping.recipient.phone)
        .bind(&shipping.recipient.address)
        .bind(&shipping.recipient.province)
        .bind(&shipping.recipient.district)
        .bind(&shipping.recipient.ward)
        .bind(shipping.expected_delivery)
        .bind(shipping.shipped_at)
        .bind(shipping.delivered_at)
        .bind(shipping.version)
        .bind(shipping.created_at)
        .bind(shipping.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("shipments_order_id_key")
            {
                return StoreError::Duplicate {
                    entity: "shipment",
                    key: shipping.order_id.to_string(),
                };
            }
            StoreError::Database(e)
        })?;
        Ok(())
    }

    async fn get_shipment_for_order(&self, order_id: OrderId) -> Result<Option<Shipping>> {
        let row = sqlx::query(&format!("{SELECT_SHIPMENT} WHERE order_id = $1"))
            .bind(order_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_shipment).transpose()
    }

    async fn get_shipment_by_carrier_code(
        &self,
        carrier_order_code: &str,
    ) -> Result<Option<Shipping>> {
        let row = sqlx::query(&format!(
            "{SELECT_SHIPMENT} WHERE carrier_order_code = $1 LIMIT 1"
        ))
        .bind(carrier_order_code)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_shipment).transpose()
    }

    async fn update_shipment(&self, shipping: &Shipping) -> Result<Shipping> {
        let result = sqlx::query(
            r#"
            UPDATE shipments
            SET status = $2, carrier_order_code = $3, tracking_number = $4, sort_code = $5,
                fee_cents = $6, weight_grams = $7, expected_delivery = $8, shipped_at = $9,
                delivered_at = $10, updated_at = $11, version = version + 1
            WHERE id = $1 AND version = $12
            "#,
        )
        .bind(shipping.id.as_uuid())
        .bind(shipping.status.as_str())
        .bind(&shipping.carrier_order_code)
        .bind(&shipping.tracking_number)
        .bind(&shipping.sort_code)
        .bind(shipping.fee.cents())
        .bind(shipping.weight_grams as i32)
        .bind(shipping.expected_delivery)
        .bind(shipping.shipped_at)
        .bind(shipping.delivered_at)
        .bind(shipping.updated_at)
        .bind(shipping.version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let exists = sqlx::query("SELECT 1 FROM shipments WHERE id = $1")
                .bind(shipping.id.as_uuid())
                .fetch_optional(&self.pool)
                .await?
                .is_some();

            return Err(if exists {
                StoreError::VersionConflict {
                    entity: "shipment",
                    key: shipping.id.to_string(),
                    expected: shipping.version,
                }
            } else {
                StoreError::NotFound {
                    entity: "shipment",
                    key: shipping.id.to_string(),
                }
            });
        }

        let mut updated = shipping.clone();
        updated.version += 1;
        Ok(updated)
    }
}

#[async_trait]
impl ShipmentIntentStore for PostgresStore {
    async fn get_intent(&self, id: Uuid) -> Result<Option<ShipmentIntent>> {
        let row = sqlx::query(&format!("{SELECT_INTENT} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_intent).transpose()
    }

    async fn get_intent_for_order(&self, order_id: OrderId) -> Result<Option<ShipmentIntent>> {
        let row = sqlx::query(&format!("{SELECT_INTENT} WHERE order_id = $1"))
            .bind(order_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_intent).transpose()
    }

    async fn update_intent(&self, intent: &ShipmentIntent) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE shipment_intents
            SET status = $2, attempts = $3, last_error = $4, updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(intent.id)
        .bind(intent.status.as_str())
        .bind(intent.attempts as i32)
        .bind(&intent.last_error)
        .bind(intent.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "shipment intent",
                key: intent.id.to_string(),
            });
        }
        Ok(())
    }

    async fn pending_intents(&self, limit: i64) -> Result<Vec<ShipmentIntent>> {
        let rows = sqlx::query(&format!(
            "{SELECT_INTENT} WHERE status = 'Pending' ORDER BY created_at LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_intent).collect()
    }
}

#[async_trait]
impl WebhookEventStore for PostgresStore {
    async fn insert_webhook_event(&self, record: &WebhookEventRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO webhook_events (id, source, order_ref, response_code, duration_ms,
                success, error, metadata, source_ip, user_agent, webhook_id, received_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(record.id)
        .bind(record.source.as_str())
        .bind(&record.order_ref)
        .bind(&record.response_code)
        .bind(record.duration_ms as i64)
        .bind(record.success)
        .bind(&record.error)
        .bind(&record.metadata)
        .bind(&record.source_ip)
        .bind(&record.user_agent)
        .bind(&record.webhook_id)
        .bind(record.received_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_webhook_events(
        &self,
        filter: &WebhookEventFilter,
    ) -> Result<Vec<WebhookEventRecord>> {
        let (sql, _) = build_webhook_filter_sql(SELECT_WEBHOOK_EVENT, filter, true);
        let mut query = sqlx::query(&sql);
        query = bind_webhook_filter(query, filter);
        query = query.bind(filter.limit).bind(filter.offset);

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(Self::row_to_webhook_event).collect()
    }

    async fn count_webhook_events(&self, filter: &WebhookEventFilter) -> Result<i64> {
        let (sql, _) =
            build_webhook_filter_sql("SELECT COUNT(*) FROM webhook_events", filter, false);
        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        if let Some(ref order_ref) = filter.order_ref {
            query = query.bind(order_ref);
        }
        if let Some(success) = filter.success {
            query = query.bind(success);
        }
        if let Some(from) = filter.from {
            query = query.bind(from);
        }
        if let Some(to) = filter.to {
            query = query.bind(to);
        }

        Ok(query.fetch_one(&self.pool).await?)
    }

    async fn delete_webhook_events_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM webhook_events WHERE received_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

/// Builds the dynamic WHERE clause for webhook-event queries.
fn build_webhook_filter_sql(
    prefix: &str,
    filter: &WebhookEventFilter,
    paginated: bool,
) -> (String, usize) {
    let mut sql = format!("{prefix} WHERE 1=1");
    let mut param_count = 0;

    if filter.order_ref.is_some() {
        param_count += 1;
        sql.push_str(&format!(" AND order_ref = ${param_count}"));
    }
    if filter.success.is_some() {
        param_count += 1;
        sql.push_str(&format!(" AND success = ${param_count}"));
    }
    if filter.from.is_some() {
        param_count += 1;
        sql.push_str(&format!(" AND received_at >= ${param_count}"));
    }
    if filter.to.is_some() {
        param_count += 1;
        sql.push_str(&format!(" AND received_at <= ${param_count}"));
    }

    if paginated {
        sql.push_str(" ORDER BY received_at DESC");
        param_count += 1;
        sql.push_str(&format!(" LIMIT ${param_count}"));
        param_count += 1;
        sql.push_str(&format!(" OFFSET ${param_count}"));
    }

    (sql, param_count)
}

fn bind_webhook_filter<'q>(
    mut query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    filter: &'q WebhookEventFilter,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    if let Some(ref order_ref) = filter.order_ref {
        query = query.bind(order_ref);
    }
    if let Some(success) = filter.success {
        query = query.bind(success);
    }
    if let Some(from) = filter.from {
        query = query.bind(from);
    }
    if let Some(to) = filter.to {
        query = query.bind(to);
    }
    query
}

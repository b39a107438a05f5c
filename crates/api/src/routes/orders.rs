//! Order creation, status, payment, and tracking endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use carrier::CarrierApi;
use chrono::{DateTime, Utc};
use common::{Money, OrderId};
use domain::{Order, OrderStatus, Payment, PaymentMethod, Recipient, Shipping};
use saga::{CreateOrderInput, OrderLineInput, ShipmentOutcome, VoucherClaim};
use serde::{Deserialize, Serialize};
use store::FulfillmentStore;

use crate::AppState;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub items: Vec<OrderItemRequest>,
    pub payment_method: String,
    pub recipient: RecipientRequest,
    pub voucher: Option<VoucherRequest>,
}

#[derive(Deserialize)]
pub struct OrderItemRequest {
    pub sku: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
}

#[derive(Deserialize)]
pub struct RecipientRequest {
    pub name: String,
    pub phone: String,
    pub address: String,
    pub province: String,
    pub district: String,
    pub ward: String,
}

#[derive(Deserialize)]
pub struct VoucherRequest {
    pub code: String,
    pub discount_cents: i64,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Deserialize, Default)]
pub struct RetryPaymentRequest {
    pub method: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderView {
    pub id: String,
    pub order_number: String,
    pub status: String,
    pub subtotal_cents: i64,
    pub shipping_fee_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub is_paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub canceled_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub voucher_code: Option<String>,
    pub lines: Vec<OrderLineView>,
}

#[derive(Serialize)]
pub struct OrderLineView {
    pub sku: String,
    pub name: String,
    pub unit_price_cents: i64,
    pub quantity: u32,
}

#[derive(Serialize)]
pub struct PaymentView {
    pub id: String,
    pub method: String,
    pub status: String,
    pub amount_cents: i64,
    pub txn_ref: String,
    pub gateway_txn_no: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub refund_required: bool,
}

#[derive(Serialize)]
pub struct ShippingView {
    pub id: String,
    pub status: String,
    pub carrier_order_code: Option<String>,
    pub tracking_number: Option<String>,
    pub sort_code: Option<String>,
    pub fee_cents: i64,
    pub expected_delivery: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
pub struct ShipmentOutcomeView {
    pub created: bool,
    pub shipping: Option<ShippingView>,
    pub error: Option<String>,
}

#[derive(Serialize)]
pub struct CreateOrderResponse {
    pub order: OrderView,
    pub payment: PaymentView,
    pub payment_url: Option<String>,
    pub shipment: ShipmentOutcomeView,
}

#[derive(Serialize)]
pub struct OrderDetailResponse {
    pub order: OrderView,
    pub payment: Option<PaymentView>,
    pub shipping: Option<ShippingView>,
}

#[derive(Serialize)]
pub struct PaymentStatusResponse {
    pub payment: PaymentView,
    pub retry_eligible: bool,
}

#[derive(Serialize)]
pub struct RetryPaymentResponse {
    pub payment: PaymentView,
    pub payment_url: Option<String>,
}

#[derive(Serialize)]
pub struct SyncShippingResponse {
    pub shipping: ShippingView,
    pub changed: bool,
}

impl From<&Order> for OrderView {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id.to_string(),
            order_number: order.order_number.clone(),
            status: order.status.to_string(),
            subtotal_cents: order.subtotal.cents(),
            shipping_fee_cents: order.shipping_fee.cents(),
            discount_cents: order.discount.cents(),
            total_cents: order.total.cents(),
            is_paid: order.is_paid,
            paid_at: order.paid_at,
            canceled_at: order.canceled_at,
            completed_at: order.completed_at,
            voucher_code: order.voucher_code.clone(),
            lines: order
                .lines
                .iter()
                .map(|line| OrderLineView {
                    sku: line.sku.clone(),
                    name: line.name.clone(),
                    unit_price_cents: line.unit_price.cents(),
                    quantity: line.quantity,
                })
                .collect(),
        }
    }
}

impl From<&Payment> for PaymentView {
    fn from(payment: &Payment) -> Self {
        Self {
            id: payment.id.to_string(),
            method: payment.method.to_string(),
            status: payment.status.to_string(),
            amount_cents: payment.amount.cents(),
            txn_ref: payment.txn_ref.clone(),
            gateway_txn_no: payment.gateway_txn_no.clone(),
            paid_at: payment.paid_at,
            refund_required: payment.refund_required,
        }
    }
}

impl From<&Shipping> for ShippingView {
    fn from(shipping: &Shipping) -> Self {
        Self {
            id: shipping.id.to_string(),
            status: shipping.status.to_string(),
            carrier_order_code: shipping.carrier_order_code.clone(),
            tracking_number: shipping.tracking_number.clone(),
            sort_code: shipping.sort_code.clone(),
            fee_cents: shipping.fee.cents(),
            expected_delivery: shipping.expected_delivery,
            shipped_at: shipping.shipped_at,
            delivered_at: shipping.delivered_at,
        }
    }
}

// -- Handlers --

fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid order id: {e}")))?;
    Ok(OrderId::from_uuid(uuid))
}

fn parse_method(value: &str) -> Result<PaymentMethod, ApiError> {
    PaymentMethod::parse(value)
        .map_err(|_| ApiError::BadRequest(format!("Unknown payment method: {value}")))
}

fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .unwrap_or("127.0.0.1")
        .trim()
        .to_string()
}

/// POST /orders — run the order-creation saga.
#[tracing::instrument(skip(state, headers, req))]
pub async fn create<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    headers: HeaderMap,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(axum::http::StatusCode, Json<CreateOrderResponse>), ApiError>
where
    S: FulfillmentStore + Clone + Send + Sync + 'static,
    C: CarrierApi + 'static,
{
    let input = CreateOrderInput {
        lines: req
            .items
            .iter()
            .map(|item| OrderLineInput {
                sku: item.sku.clone(),
                quantity: item.quantity,
                unit_price: Money::from_cents(item.unit_price_cents),
            })
            .collect(),
        payment_method: parse_method(&req.payment_method)?,
        recipient: Recipient {
            name: req.recipient.name,
            phone: req.recipient.phone,
            address: req.recipient.address,
            province: req.recipient.province,
            district: req.recipient.district,
            ward: req.recipient.ward,
        },
        voucher: req.voucher.map(|v| VoucherClaim {
            code: v.code,
            discount: Money::from_cents(v.discount_cents),
        }),
        client_ip: client_ip(&headers),
    };

    let outcome = state.orchestrator.create_order(input).await?;

    let shipment = match &outcome.shipment {
        ShipmentOutcome::Created(shipping) => ShipmentOutcomeView {
            created: true,
            shipping: Some(shipping.into()),
            error: None,
        },
        ShipmentOutcome::Deferred { error } => ShipmentOutcomeView {
            created: false,
            shipping: None,
            error: Some(error.clone()),
        },
    };

    Ok((
        axum::http::StatusCode::CREATED,
        Json(CreateOrderResponse {
            order: (&outcome.order).into(),
            payment: (&outcome.payment).into(),
            payment_url: outcome.payment_url,
            shipment,
        }),
    ))
}

/// GET /orders/{id} — order with its payment and shipment.
#[tracing::instrument(skip(state))]
pub async fn get<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderDetailResponse>, ApiError>
where
    S: FulfillmentStore + Clone + Send + Sync + 'static,
    C: CarrierApi + 'static,
{
    let order_id = parse_order_id(&id)?;
    let order = state.orchestrator.orders().load(order_id).await?;
    let payment = state.orchestrator.payments().latest(&order).await.ok();
    let shipping = state
        .orchestrator
        .shipments()
        .load_for_order(order_id)
        .await
        .ok();

    Ok(Json(OrderDetailResponse {
        order: (&order).into(),
        payment: payment.as_ref().map(Into::into),
        shipping: shipping.as_ref().map(Into::into),
    }))
}

/// POST /orders/{id}/status — apply a status transition.
#[tracing::instrument(skip(state, req))]
pub async fn update_status<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<OrderView>, ApiError>
where
    S: FulfillmentStore + Clone + Send + Sync + 'static,
    C: CarrierApi + 'static,
{
    let order_id = parse_order_id(&id)?;
    let status = OrderStatus::parse(&req.status)
        .map_err(|_| ApiError::BadRequest(format!("Unknown order status: {}", req.status)))?;

    let order = state.orchestrator.update_status(order_id, status).await?;
    Ok(Json((&order).into()))
}

/// POST /orders/{id}/cancel — cancel the order, shipment, and pending payment.
#[tracing::instrument(skip(state))]
pub async fn cancel<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderView>, ApiError>
where
    S: FulfillmentStore + Clone + Send + Sync + 'static,
    C: CarrierApi + 'static,
{
    let order_id = parse_order_id(&id)?;
    let order = state.orchestrator.cancel_order(order_id).await?;
    Ok(Json((&order).into()))
}

/// GET /orders/{id}/payment — latest payment and retry eligibility.
#[tracing::instrument(skip(state))]
pub async fn payment_status<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    Path(id): Path<String>,
) -> Result<Json<PaymentStatusResponse>, ApiError>
where
    S: FulfillmentStore + Clone + Send + Sync + 'static,
    C: CarrierApi + 'static,
{
    let order_id = parse_order_id(&id)?;
    let view = state.orchestrator.check_payment(order_id).await?;
    Ok(Json(PaymentStatusResponse {
        payment: (&view.payment).into(),
        retry_eligible: view.retry_eligible,
    }))
}

/// POST /orders/{id}/payment/retry — replace the latest eligible payment.
#[tracing::instrument(skip(state, headers, req))]
pub async fn retry_payment<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<RetryPaymentRequest>,
) -> Result<Json<RetryPaymentResponse>, ApiError>
where
    S: FulfillmentStore + Clone + Send + Sync + 'static,
    C: CarrierApi + 'static,
{
    let order_id = parse_order_id(&id)?;
    let method = req.method.as_deref().map(parse_method).transpose()?;

    let (payment, payment_url) = state
        .orchestrator
        .retry_payment(order_id, method, &client_ip(&headers))
        .await?;

    Ok(Json(RetryPaymentResponse {
        payment: (&payment).into(),
        payment_url,
    }))
}

/// POST /orders/{id}/payment/refund — operator refund of a settled payment.
#[tracing::instrument(skip(state))]
pub async fn refund_payment<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    Path(id): Path<String>,
) -> Result<Json<PaymentView>, ApiError>
where
    S: FulfillmentStore + Clone + Send + Sync + 'static,
    C: CarrierApi + 'static,
{
    let order_id = parse_order_id(&id)?;
    let payment = state.orchestrator.refund_payment(order_id).await?;
    Ok(Json((&payment).into()))
}

/// POST /orders/{id}/shipping/sync — pull tracking state from the carrier.
#[tracing::instrument(skip(state))]
pub async fn sync_shipping<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    Path(id): Path<String>,
) -> Result<Json<SyncShippingResponse>, ApiError>
where
    S: FulfillmentStore + Clone + Send + Sync + 'static,
    C: CarrierApi + 'static,
{
    let order_id = parse_order_id(&id)?;
    let (shipping, changed) = state.orchestrator.sync_shipment_tracking(order_id).await?;
    Ok(Json(SyncShippingResponse {
        shipping: (&shipping).into(),
        changed,
    }))
}

//! Webhook ingestion endpoints.
//!
//! Every inbound callback is logged with a locally-generated correlation id,
//! authenticated, validated, routed into the ledgers, and recorded to
//! monitoring regardless of outcome. Response codes follow each provider's
//! own vocabulary: the gateway retries on `99`, the carrier always gets a
//! 2xx acknowledgment.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Form, State};
use axum::http::HeaderMap;
use carrier::{CarrierApi, CarrierStatus};
use chrono::Utc;
use gateway::{GatewayError, SignatureCheck};
use hmac::{Hmac, Mac};
use saga::CallbackOutcome;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use store::{FulfillmentStore, WebhookEventRecord, WebhookSource};
use uuid::Uuid;

use crate::AppState;

/// The gateway's IPN response vocabulary.
#[derive(Debug, Serialize)]
pub struct IpnResponse {
    #[serde(rename = "RspCode")]
    pub rsp_code: &'static str,
    #[serde(rename = "Message")]
    pub message: &'static str,
}

impl IpnResponse {
    const CONFIRMED: Self = Self {
        rsp_code: "00",
        message: "Confirm Success",
    };
    const ORDER_NOT_FOUND: Self = Self {
        rsp_code: "01",
        message: "Order not found",
    };
    const ALREADY_CONFIRMED: Self = Self {
        rsp_code: "02",
        message: "Order already confirmed",
    };
    const INVALID_AMOUNT: Self = Self {
        rsp_code: "04",
        message: "Invalid amount",
    };
    const INVALID_SIGNATURE: Self = Self {
        rsp_code: "97",
        message: "Invalid signature",
    };
    /// The only retry-inducing code: the gateway redelivers on `99`.
    const UNKNOWN_ERROR: Self = Self {
        rsp_code: "99",
        message: "Unknown error",
    };
}

/// Carrier callback body.
#[derive(Debug, Deserialize)]
pub struct CarrierStatusUpdate {
    pub order_code: Option<String>,
    pub status: Option<String>,
    #[allow(dead_code)]
    pub updated_date: Option<String>,
    pub description: Option<String>,
}

/// Carrier acknowledgment. Always delivered with a 2xx status, including on
/// internal failure, to avoid carrier retry storms; failures are visible
/// only through monitoring.
#[derive(Debug, Serialize)]
pub struct CarrierAck {
    pub success: bool,
    pub message: String,
}

/// POST /webhooks/payment/ipn — gateway payment confirmation callback.
#[tracing::instrument(skip(state, headers, params))]
pub async fn payment_ipn<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    headers: HeaderMap,
    Form(params): Form<HashMap<String, String>>,
) -> Json<IpnResponse>
where
    S: FulfillmentStore + Clone + Send + Sync + 'static,
    C: CarrierApi + 'static,
{
    let correlation_id = Uuid::new_v4();
    let started = Instant::now();
    let received_at = Utc::now();
    let order_ref = params.get("vnp_TxnRef").cloned();

    tracing::info!(
        %correlation_id,
        order_ref = order_ref.as_deref().unwrap_or("<missing>"),
        "payment webhook received"
    );

    let gateway = state.orchestrator.payments().gateway();
    let (response, error) = match gateway.verify_callback(&params) {
        SignatureCheck::Invalid => {
            // Security event: the provider will retry regardless, but this
            // must never be applied.
            tracing::warn!(%correlation_id, "payment webhook signature mismatch");
            (
                IpnResponse::INVALID_SIGNATURE,
                Some("invalid signature".to_string()),
            )
        }
        SignatureCheck::Valid | SignatureCheck::Bypassed => {
            match gateway.parse_callback(&params) {
                Err(e @ GatewayError::InvalidAmount(_)) => {
                    (IpnResponse::INVALID_AMOUNT, Some(e.to_string()))
                }
                Err(e) => (IpnResponse::ORDER_NOT_FOUND, Some(e.to_string())),
                Ok(callback) => {
                    match state
                        .orchestrator
                        .payments()
                        .apply_gateway_callback(&callback, received_at)
                        .await
                    {
                        Ok(CallbackOutcome::Applied { .. }) => (IpnResponse::CONFIRMED, None),
                        Ok(CallbackOutcome::AlreadyProcessed { .. }) => {
                            (IpnResponse::ALREADY_CONFIRMED, None)
                        }
                        Ok(CallbackOutcome::AmountMismatch { .. }) => (
                            IpnResponse::INVALID_AMOUNT,
                            Some("amount mismatch".to_string()),
                        ),
                        Ok(CallbackOutcome::OrderUnknown) => (
                            IpnResponse::ORDER_NOT_FOUND,
                            Some("no matching order".to_string()),
                        ),
                        Err(e) => {
                            tracing::error!(%correlation_id, error = %e, "payment webhook processing failed");
                            (IpnResponse::UNKNOWN_ERROR, Some(e.to_string()))
                        }
                    }
                }
            }
        }
    };

    let mut record = WebhookEventRecord::new(WebhookSource::Payment, error.is_none(), received_at);
    record.order_ref = order_ref;
    record.response_code = Some(response.rsp_code.to_string());
    record.duration_ms = started.elapsed().as_millis() as u64;
    record.error = error;
    record.metadata = serde_json::json!({
        "correlation_id": correlation_id,
        "response_code": params.get("vnp_ResponseCode"),
        "transaction_status": params.get("vnp_TransactionStatus"),
        "bank_code": params.get("vnp_BankCode"),
    });
    record.source_ip = forwarded_ip(&headers);
    record.user_agent = header_string(&headers, "user-agent");
    record.webhook_id = params.get("vnp_TransactionNo").cloned();
    state.monitor.record(&record).await;

    Json(response)
}

/// POST /webhooks/shipping/status-update — carrier delivery status callback.
#[tracing::instrument(skip(state, headers, body))]
pub async fn carrier_status<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<CarrierAck>
where
    S: FulfillmentStore + Clone + Send + Sync + 'static,
    C: CarrierApi + 'static,
{
    let correlation_id = Uuid::new_v4();
    let started = Instant::now();
    let received_at = Utc::now();
    tracing::info!(%correlation_id, "carrier webhook received");

    let mut order_ref = None;
    let (success, message) = 'outcome: {
        // Optional body signature, verified only when a secret is configured.
        if let Some(secret) = state.carrier_webhook_secret.as_deref()
            && !verify_carrier_signature(secret, &headers, &body)
        {
            tracing::warn!(%correlation_id, "carrier webhook signature mismatch");
            break 'outcome (false, "invalid signature".to_string());
        }

        let update: CarrierStatusUpdate = match serde_json::from_slice(&body) {
            Ok(update) => update,
            Err(e) => break 'outcome (false, format!("malformed payload: {e}")),
        };

        // Minimum correlating fields.
        let (Some(order_code), Some(status)) = (update.order_code, update.status) else {
            break 'outcome (false, "missing order_code or status".to_string());
        };
        order_ref = Some(order_code.clone());

        let mapped = CarrierStatus::parse(&status).to_shipping_status();
        match state
            .orchestrator
            .shipments()
            .apply_status_by_code(&order_code, mapped, received_at)
            .await
        {
            Ok((_, true)) => (true, format!("status updated to {mapped}")),
            Ok((_, false)) => (true, "status unchanged".to_string()),
            Err(e) => {
                tracing::warn!(%correlation_id, error = %e, "carrier webhook not applied");
                (false, e.to_string())
            }
        }
    };

    let mut record = WebhookEventRecord::new(WebhookSource::Carrier, success, received_at);
    record.order_ref = order_ref;
    record.response_code = Some(if success { "200" } else { "failed" }.to_string());
    record.duration_ms = started.elapsed().as_millis() as u64;
    record.error = (!success).then(|| message.clone());
    record.metadata = serde_json::json!({ "correlation_id": correlation_id });
    record.source_ip = forwarded_ip(&headers);
    record.user_agent = header_string(&headers, "user-agent");
    record.webhook_id = header_string(&headers, "x-webhook-id");
    state.monitor.record(&record).await;

    Json(CarrierAck { success, message })
}

/// HMAC-SHA256 over the raw body, hex in the `x-carrier-signature` header.
fn verify_carrier_signature(secret: &str, headers: &HeaderMap, body: &[u8]) -> bool {
    let Some(provided) = header_string(headers, "x-carrier-signature") else {
        return false;
    };
    let Ok(sig_bytes) = hex::decode(provided) else {
        return false;
    };

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(body);
    mac.verify_slice(&sig_bytes).is_ok()
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
}

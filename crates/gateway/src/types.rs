//! Gateway configuration and callback types.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use common::Money;
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

/// The gateway's fixed timezone offset (UTC+7) used for `vnp_CreateDate`
/// and `vnp_PayDate`.
pub const GATEWAY_TZ_OFFSET_HOURS: i32 = 7;

/// Response/transaction code that means success. Both must match.
pub const SUCCESS_CODE: &str = "00";

/// Gateway connection settings.
///
/// An empty `secret` disables signature verification — a deliberate
/// non-production bypass for sandbox setups without credentials.
#[derive(Debug, Clone)]
pub struct VnpayConfig {
    /// Merchant terminal code.
    pub tmn_code: String,
    /// Shared HMAC secret.
    pub secret: String,
    /// Base URL of the hosted payment page.
    pub pay_url: String,
    /// URL the customer is redirected back to.
    pub return_url: String,
    /// Protocol version sent as `vnp_Version`.
    pub version: String,
}

impl Default for VnpayConfig {
    fn default() -> Self {
        Self {
            tmn_code: String::new(),
            secret: String::new(),
            pay_url: "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html".to_string(),
            return_url: "http://localhost:3000/payment/return".to_string(),
            version: "2.1.0".to_string(),
        }
    }
}

impl VnpayConfig {
    /// Returns true when no shared secret is configured.
    pub fn secret_unconfigured(&self) -> bool {
        self.secret.is_empty()
    }
}

/// Outcome of callback signature verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureCheck {
    /// Signature present and correct.
    Valid,
    /// Signature absent or wrong.
    Invalid,
    /// No secret configured; verification deliberately skipped.
    Bypassed,
}

/// A parsed gateway IPN callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentCallback {
    /// Merchant transaction reference (the order number).
    pub txn_ref: String,
    /// Amount, parsed back from the ×100 wire encoding.
    pub amount: Money,
    /// Gateway response code.
    pub response_code: String,
    /// Gateway transaction status code.
    pub transaction_status: String,
    /// Gateway-side transaction number.
    pub transaction_no: Option<String>,
    /// Bank that processed the payment.
    pub bank_code: Option<String>,
    /// Pay date as reported by the gateway, normalized to UTC.
    pub pay_date: Option<DateTime<Utc>>,
}

impl PaymentCallback {
    /// Parses a callback from the flat parameter map.
    ///
    /// The minimum correlating fields are the transaction reference, the
    /// amount, and both status codes; anything else is optional.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, GatewayError> {
        let txn_ref = require(params, "vnp_TxnRef")?;
        let amount_raw = require(params, "vnp_Amount")?;
        let response_code = require(params, "vnp_ResponseCode")?;
        let transaction_status = require(params, "vnp_TransactionStatus")?;

        // Wire amounts are major units × 100, which is exactly the minor-unit
        // representation `Money` stores.
        let amount_cents: i64 = amount_raw
            .parse()
            .map_err(|_| GatewayError::InvalidAmount(amount_raw.clone()))?;
        if amount_cents < 0 {
            return Err(GatewayError::InvalidAmount(amount_raw));
        }

        let pay_date = match params.get("vnp_PayDate") {
            Some(raw) if !raw.is_empty() => Some(parse_pay_date(raw)?),
            _ => None,
        };

        Ok(Self {
            txn_ref,
            amount: Money::from_cents(amount_cents),
            response_code,
            transaction_status,
            transaction_no: params.get("vnp_TransactionNo").cloned(),
            bank_code: params.get("vnp_BankCode").cloned(),
            pay_date,
        })
    }

    /// A payment succeeded only when both the response code and the
    /// transaction status are the success code; either alone is insufficient.
    pub fn is_success(&self) -> bool {
        self.response_code == SUCCESS_CODE && self.transaction_status == SUCCESS_CODE
    }
}

fn require(params: &HashMap<String, String>, field: &'static str) -> Result<String, GatewayError> {
    match params.get(field) {
        Some(value) if !value.is_empty() => Ok(value.clone()),
        _ => Err(GatewayError::MissingField(field)),
    }
}

/// Parses the gateway's `yyyyMMddHHmmss` timestamp in its fixed UTC+7 zone.
pub fn parse_pay_date(raw: &str) -> Result<DateTime<Utc>, GatewayError> {
    let naive = NaiveDateTime::parse_from_str(raw, "%Y%m%d%H%M%S")
        .map_err(|_| GatewayError::InvalidPayDate(raw.to_string()))?;
    let offset = FixedOffset::east_opt(GATEWAY_TZ_OFFSET_HOURS * 3600)
        .ok_or_else(|| GatewayError::InvalidPayDate(raw.to_string()))?;
    let local = offset
        .from_local_datetime(&naive)
        .single()
        .ok_or_else(|| GatewayError::InvalidPayDate(raw.to_string()))?;
    Ok(local.with_timezone(&Utc))
}

/// Formats a UTC instant as the gateway's `yyyyMMddHHmmss` in UTC+7.
pub fn format_gateway_date(at: DateTime<Utc>) -> String {
    let offset = FixedOffset::east_opt(GATEWAY_TZ_OFFSET_HOURS * 3600)
        .expect("fixed offset is valid");
    at.with_timezone(&offset).format("%Y%m%d%H%M%S").to_string()
}

//! Gateway client: redirect-URL construction and callback verification.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use common::Money;

use crate::error::GatewayError;
use crate::signing::{self, SECURE_HASH_FIELD};
use crate::types::{PaymentCallback, SignatureCheck, VnpayConfig, format_gateway_date};

/// The payment gateway adapter.
///
/// The gateway flow is redirect-based: the adapter only builds signed URLs
/// and interprets the signed callbacks the gateway posts back.
#[derive(Debug, Clone)]
pub struct VnpayGateway {
    config: VnpayConfig,
}

impl VnpayGateway {
    /// Creates a new gateway adapter.
    pub fn new(config: VnpayConfig) -> Self {
        Self { config }
    }

    /// Returns the adapter configuration.
    pub fn config(&self) -> &VnpayConfig {
        &self.config
    }

    /// Builds the signed hosted-payment redirect URL for an order.
    ///
    /// `amount` goes onto the wire in the gateway's ×100 convention, which is
    /// the minor-unit value `Money` already stores.
    pub fn build_payment_url(
        &self,
        txn_ref: &str,
        amount: Money,
        order_info: &str,
        client_ip: &str,
        created_at: DateTime<Utc>,
    ) -> String {
        let params = HashMap::from([
            ("vnp_Version".to_string(), self.config.version.clone()),
            ("vnp_Command".to_string(), "pay".to_string()),
            ("vnp_TmnCode".to_string(), self.config.tmn_code.clone()),
            ("vnp_Amount".to_string(), amount.cents().to_string()),
            ("vnp_CurrCode".to_string(), "VND".to_string()),
            ("vnp_TxnRef".to_string(), txn_ref.to_string()),
            ("vnp_OrderInfo".to_string(), order_info.to_string()),
            ("vnp_OrderType".to_string(), "other".to_string()),
            ("vnp_Locale".to_string(), "vn".to_string()),
            ("vnp_ReturnUrl".to_string(), self.config.return_url.clone()),
            ("vnp_IpAddr".to_string(), client_ip.to_string()),
            (
                "vnp_CreateDate".to_string(),
                format_gateway_date(created_at),
            ),
        ]);

        let query = signing::canonicalize(&params);
        let signature = signing::sign(&params, &self.config.secret);
        format!(
            "{}?{}&{}={}",
            self.config.pay_url, query, SECURE_HASH_FIELD, signature
        )
    }

    /// Verifies the signature of an inbound callback parameter map.
    ///
    /// An unconfigured secret bypasses verification — sandbox setups only;
    /// the bypass is logged so it can never pass silently in production.
    pub fn verify_callback(&self, params: &HashMap<String, String>) -> SignatureCheck {
        if self.config.secret_unconfigured() {
            tracing::warn!("gateway secret unconfigured, skipping signature verification");
            return SignatureCheck::Bypassed;
        }

        let Some(signature) = params.get(SECURE_HASH_FIELD) else {
            return SignatureCheck::Invalid;
        };

        if signing::verify(params, &self.config.secret, signature) {
            SignatureCheck::Valid
        } else {
            SignatureCheck::Invalid
        }
    }

    /// Parses an inbound callback after signature verification.
    pub fn parse_callback(
        &self,
        params: &HashMap<String, String>,
    ) -> Result<PaymentCallback, GatewayError> {
        PaymentCallback::from_params(params)
    }
}

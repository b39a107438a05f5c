//! Durable webhook audit records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use domain::DomainError;

/// Which external system delivered the webhook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WebhookSource {
    /// Payment gateway IPN callback.
    Payment,

    /// Shipping carrier status callback.
    Carrier,
}

impl WebhookSource {
    /// Returns the source name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookSource::Payment => "Payment",
            WebhookSource::Carrier => "Carrier",
        }
    }

    /// Parses a source from its persisted name.
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        match value {
            "Payment" => Ok(WebhookSource::Payment),
            "Carrier" => Ok(WebhookSource::Carrier),
            other => Err(DomainError::UnknownValue {
                kind: "webhook source",
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for WebhookSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Append-only audit record of one inbound webhook attempt.
///
/// `order_ref` is a soft reference by value: the order may not exist (test
/// or malformed callbacks are still recorded).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEventRecord {
    pub id: Uuid,
    pub source: WebhookSource,
    pub order_ref: Option<String>,
    pub response_code: Option<String>,
    pub duration_ms: u64,
    pub success: bool,
    pub error: Option<String>,
    pub metadata: serde_json::Value,
    pub source_ip: Option<String>,
    pub user_agent: Option<String>,
    /// Caller-supplied webhook id, if the provider sent one.
    pub webhook_id: Option<String>,
    pub received_at: DateTime<Utc>,
}

impl WebhookEventRecord {
    /// Creates a record with a fresh id and the given receipt time.
    pub fn new(source: WebhookSource, success: bool, received_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source,
            order_ref: None,
            response_code: None,
            duration_ms: 0,
            success,
            error: None,
            metadata: serde_json::Value::Object(serde_json::Map::new()),
            source_ip: None,
            user_agent: None,
            webhook_id: None,
            received_at,
        }
    }
}

/// Filter for listing durable webhook events.
#[derive(Debug, Clone)]
pub struct WebhookEventFilter {
    pub order_ref: Option<String>,
    pub success: Option<bool>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for WebhookEventFilter {
    fn default() -> Self {
        Self {
            order_ref: None,
            success: None,
            from: None,
            to: None,
            limit: 50,
            offset: 0,
        }
    }
}

impl WebhookEventFilter {
    /// Returns true if the record matches every set criterion.
    pub fn matches(&self, record: &WebhookEventRecord) -> bool {
        if let Some(ref order_ref) = self.order_ref
            && record.order_ref.as_deref() != Some(order_ref.as_str())
        {
            return false;
        }
        if let Some(success) = self.success
            && record.success != success
        {
            return false;
        }
        if let Some(from) = self.from
            && record.received_at < from
        {
            return false;
        }
        if let Some(to) = self.to
            && record.received_at > to
        {
            return false;
        }
        true
    }
}

//! Rolling webhook metrics and the bounded ring buffer.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use store::WebhookEventRecord;
use uuid::Uuid;

/// A compact copy of one event held in the ring buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentEvent {
    pub id: Uuid,
    pub order_ref: Option<String>,
    pub success: bool,
    pub duration_ms: u64,
    pub received_at: DateTime<Utc>,
}

impl From<&WebhookEventRecord> for RecentEvent {
    fn from(record: &WebhookEventRecord) -> Self {
        Self {
            id: record.id,
            order_ref: record.order_ref.clone(),
            success: record.success,
            duration_ms: record.duration_ms,
            received_at: record.received_at,
        }
    }
}

/// Process-lifetime aggregate state. Not persisted; reset on operator action
/// or restart.
#[derive(Debug, Default)]
pub(crate) struct MetricsState {
    pub total: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub avg_processing_ms: f64,
    pub last_event_at: Option<DateTime<Utc>>,
    pub recent: VecDeque<RecentEvent>,
}

impl MetricsState {
    /// Folds one event into the aggregates and the ring buffer.
    pub fn apply(&mut self, record: &WebhookEventRecord, ring_capacity: usize) {
        self.total += 1;
        if record.success {
            self.success_count += 1;
        } else {
            self.failure_count += 1;
        }

        // Incremental running average, no stored sum.
        self.avg_processing_ms +=
            (record.duration_ms as f64 - self.avg_processing_ms) / self.total as f64;
        self.last_event_at = Some(record.received_at);

        self.recent.push_front(record.into());
        self.recent.truncate(ring_capacity);
    }

    /// Error rate as a percentage of all recorded events.
    pub fn error_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.failure_count as f64 / self.total as f64 * 100.0
        }
    }

    /// Failures among the most recent `window` events.
    pub fn recent_failures(&self, window: usize) -> usize {
        self.recent
            .iter()
            .take(window)
            .filter(|event| !event.success)
            .count()
    }
}

/// Serializable snapshot of the rolling metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookMetrics {
    pub total_requests: u64,
    pub success_count: u64,
    pub failure_count: u64,
    /// failures / total × 100.
    pub error_rate: f64,
    pub avg_processing_ms: f64,
    pub last_event_at: Option<DateTime<Utc>>,
    pub recent_events: Vec<RecentEvent>,
}

impl From<&MetricsState> for WebhookMetrics {
    fn from(state: &MetricsState) -> Self {
        Self {
            total_requests: state.total,
            success_count: state.success_count,
            failure_count: state.failure_count,
            error_rate: state.error_rate(),
            avg_processing_ms: state.avg_processing_ms,
            last_event_at: state.last_event_at,
            recent_events: state.recent.iter().cloned().collect(),
        }
    }
}

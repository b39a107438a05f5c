//! The webhook monitor component.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use store::{StoreError, WebhookEventRecord, WebhookEventStore};
use tokio::sync::RwLock;

use crate::alerts::{
    Alert, AlertKind, AlertSeverity, ERROR_RATE_CRITICAL_PCT, ERROR_RATE_MIN_SAMPLES,
    ERROR_RATE_WARNING_PCT, FAILURE_WINDOW, FAILURE_WINDOW_CRITICAL, FAILURE_WINDOW_ERROR,
    SLOW_PROCESSING_MS,
};
use crate::health::HealthStatus;
use crate::metrics::{MetricsState, WebhookMetrics};

/// Average processing time above which health degrades to warning, in
/// milliseconds.
const AVG_PROCESSING_WARNING_MS: f64 = 3000.0;

/// Minutes without any event before health degrades to warning.
const STALENESS_MINUTES: i64 = 5;

/// Monitor tuning knobs.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Ring buffer capacity (most recent N events).
    pub ring_capacity: usize,
    /// Default retention window for durable events, in days.
    pub retention_days: i64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            ring_capacity: 100,
            retention_days: 30,
        }
    }
}

/// Records webhook events, keeps rolling metrics, and evaluates alerts.
///
/// Constructed once per process and shared by handle; `Clone` shares the
/// same underlying state.
#[derive(Clone)]
pub struct WebhookMonitor<S> {
    store: S,
    state: Arc<RwLock<MetricsState>>,
    config: MonitorConfig,
}

impl<S: WebhookEventStore> WebhookMonitor<S> {
    /// Creates a monitor over the given durable store.
    pub fn new(store: S, config: MonitorConfig) -> Self {
        Self {
            store,
            state: Arc::new(RwLock::new(MetricsState::default())),
            config,
        }
    }

    /// Records one webhook attempt and evaluates thresholds.
    ///
    /// The durable insert is best-effort: a storage failure is logged but
    /// never blocks the in-memory aggregates — monitoring must stay available
    /// while storage is degraded. Returns the alerts triggered by this event.
    pub async fn record(&self, record: &WebhookEventRecord) -> Vec<Alert> {
        if let Err(e) = self.store.insert_webhook_event(record).await {
            tracing::warn!(error = %e, "failed to persist webhook event, keeping in-memory only");
        }

        metrics::counter!("webhook_events_total").increment(1);
        if !record.success {
            metrics::counter!("webhook_events_failed").increment(1);
        }
        metrics::histogram!("webhook_processing_ms").record(record.duration_ms as f64);

        let mut state = self.state.write().await;
        state.apply(record, self.config.ring_capacity);
        let alerts = evaluate_thresholds(&state, record);
        drop(state);

        for alert in &alerts {
            metrics::counter!("webhook_alerts_total", "kind" => alert.kind.as_str()).increment(1);
            match alert.severity {
                AlertSeverity::Warning => {
                    tracing::warn!(kind = alert.kind.as_str(), "{}", alert.message)
                }
                AlertSeverity::Error | AlertSeverity::Critical => {
                    tracing::error!(
                        kind = alert.kind.as_str(),
                        severity = alert.severity.as_str(),
                        "{}",
                        alert.message
                    )
                }
            }
        }

        alerts
    }

    /// Current metrics snapshot.
    pub async fn snapshot(&self) -> WebhookMetrics {
        WebhookMetrics::from(&*self.state.read().await)
    }

    /// Derives the tri-level health status at `now`.
    pub async fn health_at(&self, now: DateTime<Utc>) -> HealthStatus {
        let state = self.state.read().await;

        if state.error_rate() > ERROR_RATE_CRITICAL_PCT
            || state.recent_failures(FAILURE_WINDOW) >= FAILURE_WINDOW_CRITICAL
        {
            return HealthStatus::Critical;
        }

        let stale = state
            .last_event_at
            .is_some_and(|at| now - at > Duration::minutes(STALENESS_MINUTES));
        if state.error_rate() > ERROR_RATE_WARNING_PCT
            || state.avg_processing_ms > AVG_PROCESSING_WARNING_MS
            || stale
        {
            return HealthStatus::Warning;
        }

        HealthStatus::Healthy
    }

    /// Derives health at the current instant.
    pub async fn health(&self) -> HealthStatus {
        self.health_at(Utc::now()).await
    }

    /// Resets the in-memory aggregates (operator action).
    pub async fn reset(&self) {
        let mut state = self.state.write().await;
        *state = MetricsState::default();
        tracing::info!("webhook metrics reset");
    }

    /// Deletes durable events older than `days` (falling back to the
    /// configured retention window); returns the count removed.
    ///
    /// Shared by the scheduled sweep and the on-demand admin trigger.
    pub async fn run_retention_cleanup(&self, days: Option<i64>) -> Result<u64, StoreError> {
        let days = days.unwrap_or(self.config.retention_days);
        let cutoff = Utc::now() - Duration::days(days);
        let removed = self.store.delete_webhook_events_before(cutoff).await?;
        tracing::info!(days, removed, "webhook retention cleanup complete");
        Ok(removed)
    }
}

/// Evaluates alert thresholds against the state after applying `record`.
fn evaluate_thresholds(state: &MetricsState, record: &WebhookEventRecord) -> Vec<Alert> {
    let mut alerts = Vec::new();

    if record.duration_ms > SLOW_PROCESSING_MS {
        alerts.push(Alert::new(
            AlertKind::SlowProcessing,
            AlertSeverity::Warning,
            format!(
                "webhook processing took {}ms (threshold {}ms)",
                record.duration_ms, SLOW_PROCESSING_MS
            ),
        ));
    }

    let error_rate = state.error_rate();
    if error_rate > ERROR_RATE_WARNING_PCT && state.total > ERROR_RATE_MIN_SAMPLES {
        let severity = if error_rate > ERROR_RATE_CRITICAL_PCT {
            AlertSeverity::Critical
        } else {
            AlertSeverity::Warning
        };
        alerts.push(Alert::new(
            AlertKind::HighErrorRate,
            severity,
            format!(
                "webhook error rate at {error_rate:.1}% over {} events",
                state.total
            ),
        ));
    }

    let recent_failures = state.recent_failures(FAILURE_WINDOW);
    if recent_failures >= FAILURE_WINDOW_ERROR {
        let severity = if recent_failures >= FAILURE_WINDOW_CRITICAL {
            AlertSeverity::Critical
        } else {
            AlertSeverity::Error
        };
        alerts.push(Alert::new(
            AlertKind::ConsecutiveFailures,
            severity,
            format!("{recent_failures} of the last {FAILURE_WINDOW} webhooks failed"),
        ));
    }

    alerts
}

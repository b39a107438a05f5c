//! Webhook monitoring and alerting.
//!
//! `WebhookMonitor` is an explicitly owned component (constructed once per
//! process and injected) that records every inbound webhook attempt durably
//! and into a bounded in-memory ring buffer, keeps rolling aggregates, and
//! evaluates alert thresholds synchronously after each recorded event. The
//! in-memory side is an operational signal, not a source of truth: it resets
//! on operator request or process restart.

pub mod alerts;
pub mod health;
pub mod metrics;
pub mod monitor;

pub use alerts::{Alert, AlertKind, AlertSeverity};
pub use health::HealthStatus;
pub use metrics::{RecentEvent, WebhookMetrics};
pub use monitor::{MonitorConfig, WebhookMonitor};

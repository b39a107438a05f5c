//! Alert types and thresholds.

use serde::{Deserialize, Serialize};

/// Processing time above which a single event triggers a slow-processing
/// alert, in milliseconds.
pub const SLOW_PROCESSING_MS: u64 = 5000;

/// Error rate (percent) above which the high-error-rate alert fires.
pub const ERROR_RATE_WARNING_PCT: f64 = 10.0;

/// Error rate (percent) above which the alert escalates to critical.
pub const ERROR_RATE_CRITICAL_PCT: f64 = 20.0;

/// Minimum sample count before the error-rate alert is meaningful.
pub const ERROR_RATE_MIN_SAMPLES: u64 = 10;

/// Window inspected for the consecutive-failures alert.
pub const FAILURE_WINDOW: usize = 10;

/// Failures within the window that trigger the consecutive-failures alert.
pub const FAILURE_WINDOW_ERROR: usize = 3;

/// Failures within the window that escalate it to critical.
pub const FAILURE_WINDOW_CRITICAL: usize = 5;

/// Alert severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Warning,
    Error,
    Critical,
}

impl AlertSeverity {
    /// Returns the severity name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Warning => "warning",
            AlertSeverity::Error => "error",
            AlertSeverity::Critical => "critical",
        }
    }
}

/// What condition an alert reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// A single event took longer than the slow-processing threshold.
    SlowProcessing,

    /// The rolling error rate crossed its threshold.
    HighErrorRate,

    /// Too many of the most recent events failed.
    ConsecutiveFailures,
}

impl AlertKind {
    /// Returns the kind name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::SlowProcessing => "slow_processing",
            AlertKind::HighErrorRate => "high_error_rate",
            AlertKind::ConsecutiveFailures => "consecutive_failures",
        }
    }
}

/// An alert produced by threshold evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub message: String,
}

impl Alert {
    /// Creates an alert.
    pub fn new(kind: AlertKind, severity: AlertSeverity, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity,
            message: message.into(),
        }
    }
}

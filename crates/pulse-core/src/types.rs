//! Core type definitions for Pulse telemetry and health reporting

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Severity of a captured error report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low = 0,
    #[default]
    Medium = 1,
    High = 2,
    /// Critical reports bypass batching and trigger an immediate flush
    Critical = 3,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            _ => Err(format!("Invalid severity: {}", s)),
        }
    }
}

/// A captured application error, immutable once constructed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    /// Error message
    pub message: String,
    /// Stack trace or backtrace, when available
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    /// Location (page, route or module) where the error occurred
    pub url: String,
    /// Client identification string
    pub user_agent: String,
    /// Capture time
    pub timestamp: DateTime<Utc>,
    /// Session identifier, stable for the process lifetime
    pub session_id: String,
    /// User identity, if one has been attached
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Component that produced the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    /// Severity classification
    pub severity: Severity,
    /// Free-form context attached at capture time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<HashMap<String, serde_json::Value>>,
}

/// Partial error report supplied by the host; the batcher fills in defaults
/// for every unset field before enqueueing.
#[derive(Debug, Clone, Default)]
pub struct ErrorReportDraft {
    pub message: Option<String>,
    pub stack: Option<String>,
    pub url: Option<String>,
    pub user_agent: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub user_id: Option<String>,
    pub component: Option<String>,
    pub severity: Option<Severity>,
    pub context: Option<HashMap<String, serde_json::Value>>,
}

impl ErrorReportDraft {
    /// Start a draft from an error message
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Set the severity
    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    /// Set the originating component
    pub fn component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    /// Attach a context value
    pub fn context_value(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.context
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value);
        self
    }
}

/// A single performance measurement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMetric {
    /// Metric name (e.g. "page_load_ms")
    pub name: String,
    /// Measured value
    pub value: f64,
    /// Capture time
    pub timestamp: DateTime<Utc>,
    /// Location where the measurement was taken
    pub url: String,
    /// Session identifier
    pub session_id: String,
    /// Free-form context
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<HashMap<String, serde_json::Value>>,
}

/// Point-in-time view of the telemetry batcher, exposed for dashboards and
/// the telemetry self-check probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub session_id: String,
    pub is_online: bool,
    pub error_queue_size: usize,
    pub performance_queue_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// Outcome of a single health probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    Pass,
    Warn,
    Fail,
}

impl std::fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pass => write!(f, "pass"),
            Self::Warn => write!(f, "warn"),
            Self::Fail => write!(f, "fail"),
        }
    }
}

/// Overall verdict across all probes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl std::fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

impl OverallStatus {
    /// Reduce a set of probe outcomes to one verdict.
    ///
    /// Any fail makes the whole aggregate unhealthy; otherwise any warn
    /// degrades it; an empty set is healthy.
    pub fn from_checks<I: IntoIterator<Item = ProbeStatus>>(checks: I) -> Self {
        let mut overall = Self::Healthy;
        for status in checks {
            match status {
                ProbeStatus::Fail => return Self::Unhealthy,
                ProbeStatus::Warn => overall = Self::Degraded,
                ProbeStatus::Pass => {}
            }
        }
        overall
    }
}

/// Result of one probe invocation, produced fresh on every run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub status: ProbeStatus,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// Probe round-trip time, when timed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HashMap<String, serde_json::Value>>,
}

impl HealthCheckResult {
    pub fn new(status: ProbeStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            timestamp: Utc::now(),
            response_time_ms: None,
            details: None,
        }
    }

    pub fn pass(message: impl Into<String>) -> Self {
        Self::new(ProbeStatus::Pass, message)
    }

    pub fn warn(message: impl Into<String>) -> Self {
        Self::new(ProbeStatus::Warn, message)
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self::new(ProbeStatus::Fail, message)
    }

    /// Attach the measured round-trip time
    pub fn with_response_time(mut self, elapsed_ms: u64) -> Self {
        self.response_time_ms = Some(elapsed_ms);
        self
    }

    /// Attach a detail value
    pub fn with_detail(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.details
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value);
        self
    }
}

/// Runtime metrics attached to the aggregate health status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthMetrics {
    /// Errors observed / requests observed, 0.0 with no data
    pub error_rate: f64,
    /// Running average response time, 0.0 with no data
    pub response_time_ms: f64,
    /// Physical memory in use, absent when the runtime cannot report it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_usage_percent: Option<f64>,
}

impl Default for HealthMetrics {
    fn default() -> Self {
        Self {
            error_rate: 0.0,
            response_time_ms: 0.0,
            memory_usage_percent: None,
        }
    }
}

/// Aggregate health verdict, recomputed on demand and never persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateHealthStatus {
    pub status: OverallStatus,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub environment: String,
    pub uptime_ms: u64,
    /// Per-probe results keyed by probe name
    pub checks: HashMap<String, HealthCheckResult>,
    pub metrics: HealthMetrics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn test_severity_roundtrip() {
        for s in [
            Severity::Low,
            Severity::Medium,
            Severity::High,
            Severity::Critical,
        ] {
            let parsed: Severity = s.to_string().parse().unwrap();
            assert_eq!(parsed, s);
        }
        assert!("fatal".parse::<Severity>().is_err());
    }

    #[test]
    fn test_overall_status_all_pass() {
        let checks = vec![ProbeStatus::Pass; 5];
        assert_eq!(OverallStatus::from_checks(checks), OverallStatus::Healthy);
    }

    #[test]
    fn test_overall_status_any_warn_degrades() {
        for warn_at in 0..5 {
            let checks: Vec<_> = (0..5)
                .map(|i| {
                    if i == warn_at {
                        ProbeStatus::Warn
                    } else {
                        ProbeStatus::Pass
                    }
                })
                .collect();
            assert_eq!(OverallStatus::from_checks(checks), OverallStatus::Degraded);
        }
    }

    #[test]
    fn test_overall_status_any_fail_wins() {
        for fail_at in 0..5 {
            let checks: Vec<_> = (0..5)
                .map(|i| {
                    if i == fail_at {
                        ProbeStatus::Fail
                    } else {
                        ProbeStatus::Warn
                    }
                })
                .collect();
            assert_eq!(
                OverallStatus::from_checks(checks),
                OverallStatus::Unhealthy
            );
        }
    }

    #[test]
    fn test_overall_status_empty_is_healthy() {
        assert_eq!(
            OverallStatus::from_checks(std::iter::empty()),
            OverallStatus::Healthy
        );
    }

    #[test]
    fn test_draft_builder_accumulates_context() {
        let draft = ErrorReportDraft::message("boom")
            .severity(Severity::High)
            .component("checkout")
            .context_value("attempt", serde_json::json!(2))
            .context_value("path", serde_json::json!("/pay"));

        assert_eq!(draft.message.as_deref(), Some("boom"));
        assert_eq!(draft.severity, Some(Severity::High));
        assert_eq!(draft.context.as_ref().unwrap().len(), 2);
    }

    #[test]
    fn test_health_metrics_serializes_absent_memory() {
        let metrics = HealthMetrics::default();
        let json = serde_json::to_value(&metrics).unwrap();
        assert!(json.get("memory_usage_percent").is_none());
        assert_eq!(json["error_rate"], 0.0);
    }
}

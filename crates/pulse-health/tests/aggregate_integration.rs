//! End-to-end aggregation over the standard probe battery.
//!
//! An unconfigured instance must still produce a complete, useful verdict:
//! missing endpoints degrade their probes to warn, storage and telemetry
//! pass, and the aggregate is degraded rather than an error.

use pulse_core::{OverallStatus, ProbeStatus, PulseConfig};
use pulse_health::HealthAggregator;
use pulse_telemetry::TelemetryBatcher;
use std::sync::Arc;

#[tokio::test]
async fn unconfigured_instance_reports_degraded_not_dead() {
    let storage = tempfile::tempdir().unwrap();
    let mut config = PulseConfig::default();
    config.storage_dir = storage.path().to_path_buf();

    let batcher = Arc::new(TelemetryBatcher::new(config.clone()).unwrap());
    let aggregator = HealthAggregator::new(&config, batcher);

    let status = aggregator.check().await;

    assert_eq!(status.checks.len(), 5);
    assert_eq!(status.checks["backend"].status, ProbeStatus::Warn);
    assert_eq!(status.checks["origin"].status, ProbeStatus::Warn);
    assert_eq!(status.checks["auth"].status, ProbeStatus::Warn);
    assert_eq!(status.checks["storage"].status, ProbeStatus::Pass);
    assert_eq!(status.checks["telemetry"].status, ProbeStatus::Pass);
    assert_eq!(status.status, OverallStatus::Degraded);

    // No traffic recorded yet: metrics default to zero
    assert_eq!(status.metrics.error_rate, 0.0);
    assert_eq!(status.metrics.response_time_ms, 0.0);
    assert_eq!(status.environment, "development");
}

#[tokio::test]
async fn recorded_traffic_shows_up_in_metrics() {
    let storage = tempfile::tempdir().unwrap();
    let mut config = PulseConfig::default();
    config.storage_dir = storage.path().to_path_buf();

    let batcher = Arc::new(TelemetryBatcher::new(config.clone()).unwrap());
    batcher.stats().record_request(120, false);
    batcher.stats().record_request(80, true);

    let aggregator = HealthAggregator::new(&config, batcher);
    let status = aggregator.check().await;

    assert_eq!(status.metrics.error_rate, 0.5);
    assert_eq!(status.metrics.response_time_ms, 100.0);
}

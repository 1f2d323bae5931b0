//! Health aggregation
//!
//! Runs the probe battery concurrently, bounds each probe with a timeout,
//! and reduces the individual outcomes to one verdict. The aggregate call
//! itself never fails: probe errors, timeouts and panics all become `fail`
//! entries and the worst case is a fully populated `unhealthy` result.

use chrono::Utc;
use futures::future::join_all;
use pulse_core::{
    AggregateHealthStatus, HealthCheckResult, HealthMetrics, OverallStatus, PulseConfig,
};
use pulse_telemetry::TelemetryBatcher;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::probes::{
    AuthProbe, BackendProbe, OriginProbe, Probe, StorageProbe, TelemetryProbe,
};

/// Composite health checker over a fixed probe battery
pub struct HealthAggregator {
    probes: Vec<Arc<dyn Probe>>,
    probe_timeout: Duration,
    environment: String,
    /// Batcher counters feed the metrics block; absent when constructed with
    /// a custom battery that has no telemetry attached
    batcher: Option<Arc<TelemetryBatcher>>,
    started_at: Instant,
}

impl HealthAggregator {
    /// Build the standard five-probe battery from configuration
    pub fn new(config: &PulseConfig, batcher: Arc<TelemetryBatcher>) -> Self {
        let client = reqwest::Client::new();

        let probes: Vec<Arc<dyn Probe>> = vec![
            Arc::new(BackendProbe::new(
                client.clone(),
                config.probes.backend_url.clone(),
                config.probes.backend_api_key.clone(),
            )),
            Arc::new(OriginProbe::new(
                client.clone(),
                config.probes.origin_url.clone(),
            )),
            Arc::new(StorageProbe::new(config.storage_dir.clone())),
            Arc::new(AuthProbe::new(
                client,
                config.probes.auth_settings_url.clone(),
            )),
            Arc::new(TelemetryProbe::new(
                batcher.clone(),
                config.telemetry.error_backlog_warn_threshold,
            )),
        ];

        Self {
            probes,
            probe_timeout: Duration::from_secs(config.probes.probe_timeout_secs),
            environment: config.environment.clone(),
            batcher: Some(batcher),
            started_at: Instant::now(),
        }
    }

    /// Build an aggregator over a custom probe battery (tests, embedding)
    pub fn with_probes(
        probes: Vec<Arc<dyn Probe>>,
        probe_timeout: Duration,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            probes,
            probe_timeout,
            environment: environment.into(),
            batcher: None,
            started_at: Instant::now(),
        }
    }

    /// Run all probes concurrently and reduce to one verdict.
    ///
    /// Waits for every probe to settle; no single probe can reject or stall
    /// the aggregate. Each entry carries the probe's measured round-trip
    /// time, including for synthetic failures.
    pub async fn check(&self) -> AggregateHealthStatus {
        let names: Vec<String> = self.probes.iter().map(|p| p.name().to_string()).collect();

        let handles: Vec<_> = self
            .probes
            .iter()
            .map(|probe| {
                let probe = probe.clone();
                let timeout = self.probe_timeout;
                tokio::spawn(async move {
                    let name = probe.name().to_string();
                    let start = Instant::now();
                    let outcome = tokio::time::timeout(timeout, probe.run()).await;
                    let elapsed_ms = start.elapsed().as_millis() as u64;

                    let result = match outcome {
                        Ok(Ok(result)) => result,
                        Ok(Err(e)) => {
                            warn!("Probe '{}' errored: {}", name, e);
                            HealthCheckResult::fail(format!("{} check failed", name))
                        }
                        Err(_) => {
                            warn!(
                                "Probe '{}' timed out after {}ms",
                                name,
                                timeout.as_millis()
                            );
                            HealthCheckResult::fail(format!(
                                "{} check timed out after {}ms",
                                name,
                                timeout.as_millis()
                            ))
                        }
                    };
                    result.with_response_time(elapsed_ms)
                })
            })
            .collect();

        let settled = join_all(handles).await;

        let mut checks = HashMap::new();
        for (name, joined) in names.into_iter().zip(settled) {
            let result = match joined {
                Ok(result) => result,
                // A panicking probe is caught here, not propagated
                Err(e) => {
                    warn!("Probe '{}' panicked: {}", name, e);
                    HealthCheckResult::fail(format!("{} check failed", name))
                }
            };
            checks.insert(name, result);
        }

        let status = OverallStatus::from_checks(checks.values().map(|c| c.status));
        debug!("Health check complete: {} ({} probes)", status, checks.len());

        AggregateHealthStatus {
            status,
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            environment: self.environment.clone(),
            uptime_ms: self.started_at.elapsed().as_millis() as u64,
            checks,
            metrics: self.metrics(),
        }
    }

    fn metrics(&self) -> HealthMetrics {
        let (error_rate, response_time_ms) = match &self.batcher {
            Some(batcher) => {
                let stats = batcher.stats();
                (stats.error_rate(), stats.avg_response_time_ms())
            }
            None => (0.0, 0.0),
        };

        HealthMetrics {
            error_rate,
            response_time_ms,
            memory_usage_percent: memory_usage_percent(),
        }
    }
}

/// Physical memory in use, or `None` when the host cannot report it
fn memory_usage_percent() -> Option<f64> {
    let mut system = sysinfo::System::new();
    system.refresh_memory();
    let total = system.total_memory();
    if total == 0 {
        return None;
    }
    Some(system.used_memory() as f64 / total as f64 * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pulse_core::{ProbeStatus, PulseError};

    struct StubProbe {
        name: &'static str,
        status: ProbeStatus,
    }

    #[async_trait]
    impl Probe for StubProbe {
        fn name(&self) -> &str {
            self.name
        }

        async fn run(&self) -> pulse_core::Result<HealthCheckResult> {
            Ok(HealthCheckResult::new(self.status, "stubbed"))
        }
    }

    struct ErroringProbe;

    #[async_trait]
    impl Probe for ErroringProbe {
        fn name(&self) -> &str {
            "erroring"
        }

        async fn run(&self) -> pulse_core::Result<HealthCheckResult> {
            Err(PulseError::Probe("exploded before producing a result".to_string()))
        }
    }

    struct PanickingProbe;

    #[async_trait]
    impl Probe for PanickingProbe {
        fn name(&self) -> &str {
            "panicking"
        }

        async fn run(&self) -> pulse_core::Result<HealthCheckResult> {
            panic!("probe bug");
        }
    }

    struct StalledProbe;

    #[async_trait]
    impl Probe for StalledProbe {
        fn name(&self) -> &str {
            "stalled"
        }

        async fn run(&self) -> pulse_core::Result<HealthCheckResult> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(HealthCheckResult::pass("never reached"))
        }
    }

    fn battery(statuses: [(&'static str, ProbeStatus); 5]) -> Vec<Arc<dyn Probe>> {
        statuses
            .into_iter()
            .map(|(name, status)| Arc::new(StubProbe { name, status }) as Arc<dyn Probe>)
            .collect()
    }

    const ALL_PASS: [(&str, ProbeStatus); 5] = [
        ("backend", ProbeStatus::Pass),
        ("origin", ProbeStatus::Pass),
        ("storage", ProbeStatus::Pass),
        ("auth", ProbeStatus::Pass),
        ("telemetry", ProbeStatus::Pass),
    ];

    #[tokio::test]
    async fn test_all_pass_is_healthy() {
        let aggregator =
            HealthAggregator::with_probes(battery(ALL_PASS), Duration::from_secs(5), "test");
        let status = aggregator.check().await;

        assert_eq!(status.status, OverallStatus::Healthy);
        assert_eq!(status.checks.len(), 5);
        assert_eq!(status.environment, "test");
        assert!(status
            .checks
            .values()
            .all(|c| c.response_time_ms.is_some()));
        // No batcher attached: metrics default to zero
        assert_eq!(status.metrics.error_rate, 0.0);
        assert_eq!(status.metrics.response_time_ms, 0.0);
    }

    #[tokio::test]
    async fn test_one_warn_degrades_regardless_of_position() {
        for warn_at in 0..5 {
            let mut statuses = ALL_PASS;
            statuses[warn_at].1 = ProbeStatus::Warn;

            let aggregator =
                HealthAggregator::with_probes(battery(statuses), Duration::from_secs(5), "test");
            let status = aggregator.check().await;
            assert_eq!(status.status, OverallStatus::Degraded);
        }
    }

    #[tokio::test]
    async fn test_one_fail_is_unhealthy_regardless_of_position() {
        for fail_at in 0..5 {
            let mut statuses = ALL_PASS;
            statuses[fail_at].1 = ProbeStatus::Fail;

            let aggregator =
                HealthAggregator::with_probes(battery(statuses), Duration::from_secs(5), "test");
            let status = aggregator.check().await;
            assert_eq!(status.status, OverallStatus::Unhealthy);
        }
    }

    #[tokio::test]
    async fn test_erroring_probe_becomes_synthetic_fail() {
        let probes: Vec<Arc<dyn Probe>> = vec![
            Arc::new(StubProbe {
                name: "backend",
                status: ProbeStatus::Pass,
            }),
            Arc::new(ErroringProbe),
        ];

        let aggregator = HealthAggregator::with_probes(probes, Duration::from_secs(5), "test");
        let status = aggregator.check().await;

        assert_eq!(status.status, OverallStatus::Unhealthy);
        let entry = &status.checks["erroring"];
        assert_eq!(entry.status, ProbeStatus::Fail);
        assert_eq!(entry.message, "erroring check failed");
        // The healthy probe still completed
        assert_eq!(status.checks["backend"].status, ProbeStatus::Pass);
    }

    #[tokio::test]
    async fn test_panicking_probe_does_not_crash_aggregation() {
        let probes: Vec<Arc<dyn Probe>> = vec![
            Arc::new(PanickingProbe),
            Arc::new(StubProbe {
                name: "origin",
                status: ProbeStatus::Pass,
            }),
        ];

        let aggregator = HealthAggregator::with_probes(probes, Duration::from_secs(5), "test");
        let status = aggregator.check().await;

        assert_eq!(status.checks["panicking"].status, ProbeStatus::Fail);
        assert_eq!(status.checks["origin"].status, ProbeStatus::Pass);
        assert_eq!(status.status, OverallStatus::Unhealthy);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_probe_is_bounded_by_timeout() {
        let probes: Vec<Arc<dyn Probe>> = vec![
            Arc::new(StalledProbe),
            Arc::new(StubProbe {
                name: "storage",
                status: ProbeStatus::Pass,
            }),
        ];

        let aggregator = HealthAggregator::with_probes(probes, Duration::from_secs(5), "test");
        let status = aggregator.check().await;

        let entry = &status.checks["stalled"];
        assert_eq!(entry.status, ProbeStatus::Fail);
        assert!(entry.message.contains("timed out"));
        assert_eq!(status.checks["storage"].status, ProbeStatus::Pass);
    }

    #[tokio::test]
    async fn test_worst_case_still_fully_populated() {
        let probes: Vec<Arc<dyn Probe>> = vec![
            Arc::new(StubProbe {
                name: "backend",
                status: ProbeStatus::Fail,
            }),
            Arc::new(StubProbe {
                name: "origin",
                status: ProbeStatus::Fail,
            }),
            Arc::new(ErroringProbe),
            Arc::new(PanickingProbe),
            Arc::new(StubProbe {
                name: "telemetry",
                status: ProbeStatus::Fail,
            }),
        ];

        let aggregator = HealthAggregator::with_probes(probes, Duration::from_secs(5), "test");
        let status = aggregator.check().await;

        assert_eq!(status.status, OverallStatus::Unhealthy);
        assert_eq!(status.checks.len(), 5);
        assert!(status
            .checks
            .values()
            .all(|c| c.status == ProbeStatus::Fail));
    }
}

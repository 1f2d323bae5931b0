//! Built-in health probes
//!
//! Each probe answers one narrow question and maps every expected failure to
//! a `HealthCheckResult` rather than an error. A missing target URL is a
//! configuration state, not a fault, and degrades the probe to `warn` so an
//! unconfigured demo instance still reports something useful.

use async_trait::async_trait;
use pulse_core::{HealthCheckResult, Result};
use pulse_telemetry::TelemetryBatcher;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

/// A single independent health check
#[async_trait]
pub trait Probe: Send + Sync {
    /// Probe name, used as the key in the aggregate result
    fn name(&self) -> &str;

    /// Run the check once.
    ///
    /// Built-in probes map expected failures into the returned result; an
    /// `Err` here is treated by the aggregator as a probe crash and becomes
    /// a synthetic `fail` entry.
    async fn run(&self) -> Result<HealthCheckResult>;
}

/// Reachability check against the configured backend base URL
pub struct BackendProbe {
    client: reqwest::Client,
    url: Option<String>,
    api_key: Option<String>,
}

impl BackendProbe {
    pub fn new(client: reqwest::Client, url: Option<String>, api_key: Option<String>) -> Self {
        Self {
            client,
            url,
            api_key,
        }
    }
}

#[async_trait]
impl Probe for BackendProbe {
    fn name(&self) -> &str {
        "backend"
    }

    async fn run(&self) -> Result<HealthCheckResult> {
        let Some(url) = &self.url else {
            return Ok(HealthCheckResult::warn("Backend endpoint not configured"));
        };

        let mut request = self.client.get(url);
        if let Some(api_key) = &self.api_key {
            request = request.header("x-api-key", api_key);
        }

        let result = match request.send().await {
            Ok(response) if response.status().is_success() => HealthCheckResult::pass(format!(
                "Backend reachable (HTTP {})",
                response.status().as_u16()
            )),
            Ok(response) => HealthCheckResult::fail(format!(
                "Backend returned HTTP {}",
                response.status().as_u16()
            )),
            Err(e) => HealthCheckResult::fail(format!("Backend unreachable: {}", e)),
        };
        Ok(result)
    }
}

/// Reachability check against the application's own origin
///
/// A non-2xx answer from our own origin is suspicious but survivable, so it
/// degrades rather than fails.
pub struct OriginProbe {
    client: reqwest::Client,
    url: Option<String>,
}

impl OriginProbe {
    pub fn new(client: reqwest::Client, url: Option<String>) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl Probe for OriginProbe {
    fn name(&self) -> &str {
        "origin"
    }

    async fn run(&self) -> Result<HealthCheckResult> {
        let Some(url) = &self.url else {
            return Ok(HealthCheckResult::warn("Origin not configured"));
        };

        let result = match self.client.get(url).send().await {
            Ok(response) if response.status().is_success() => HealthCheckResult::pass(format!(
                "Origin reachable (HTTP {})",
                response.status().as_u16()
            )),
            Ok(response) => HealthCheckResult::warn(format!(
                "Origin returned HTTP {}",
                response.status().as_u16()
            )),
            Err(e) => HealthCheckResult::fail(format!("Origin unreachable: {}", e)),
        };
        Ok(result)
    }
}

/// Round-trip check of local persistent storage
///
/// Writes a sentinel value, reads it back, deletes it and compares. Any I/O
/// error (storage disabled, full, unwritable) fails the probe.
pub struct StorageProbe {
    dir: PathBuf,
    /// Overwrite the sentinel between write and read, exercising the
    /// corrupted-storage branch
    #[cfg(test)]
    corrupt_after_write: bool,
}

const SENTINEL_FILE: &str = "pulse_health_check";

impl StorageProbe {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            #[cfg(test)]
            corrupt_after_write: false,
        }
    }

    #[cfg(test)]
    fn corrupting(dir: PathBuf) -> Self {
        Self {
            dir,
            corrupt_after_write: true,
        }
    }
}

#[async_trait]
impl Probe for StorageProbe {
    fn name(&self) -> &str {
        "storage"
    }

    async fn run(&self) -> Result<HealthCheckResult> {
        let sentinel = Uuid::new_v4().to_string();
        let path = self.dir.join(SENTINEL_FILE);

        if let Err(e) = tokio::fs::create_dir_all(&self.dir).await {
            return Ok(HealthCheckResult::fail(format!(
                "Storage unavailable: {}",
                e
            )));
        }
        if let Err(e) = tokio::fs::write(&path, &sentinel).await {
            return Ok(HealthCheckResult::fail(format!("Storage write failed: {}", e)));
        }
        #[cfg(test)]
        if self.corrupt_after_write {
            let _ = tokio::fs::write(&path, "corrupted").await;
        }
        let read_back = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) => {
                return Ok(HealthCheckResult::fail(format!(
                    "Storage read failed: {}",
                    e
                )))
            }
        };
        if let Err(e) = tokio::fs::remove_file(&path).await {
            return Ok(HealthCheckResult::fail(format!(
                "Storage delete failed: {}",
                e
            )));
        }

        let result = if read_back == sentinel {
            HealthCheckResult::pass("Storage read/write ok")
        } else {
            HealthCheckResult::fail("Storage sentinel mismatch")
        };
        Ok(result)
    }
}

/// Reachability check against the auth-service settings endpoint
///
/// Auth being down degrades the instance (cached sessions keep working), so
/// a non-2xx answer is `warn`, not `fail`.
pub struct AuthProbe {
    client: reqwest::Client,
    url: Option<String>,
}

impl AuthProbe {
    pub fn new(client: reqwest::Client, url: Option<String>) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl Probe for AuthProbe {
    fn name(&self) -> &str {
        "auth"
    }

    async fn run(&self) -> Result<HealthCheckResult> {
        let Some(url) = &self.url else {
            return Ok(HealthCheckResult::warn("Auth endpoint not configured"));
        };

        let result = match self.client.get(url).send().await {
            Ok(response) if response.status().is_success() => HealthCheckResult::pass(format!(
                "Auth service reachable (HTTP {})",
                response.status().as_u16()
            )),
            Ok(response) => HealthCheckResult::warn(format!(
                "Auth service returned HTTP {}",
                response.status().as_u16()
            )),
            Err(e) => HealthCheckResult::fail(format!("Auth service unreachable: {}", e)),
        };
        Ok(result)
    }
}

/// Self-check against the telemetry batcher
///
/// A growing error backlog or an offline client means telemetry is not
/// reaching the collector; both degrade to `warn`. This probe cannot fail.
pub struct TelemetryProbe {
    batcher: Arc<TelemetryBatcher>,
    backlog_warn_threshold: usize,
}

impl TelemetryProbe {
    pub fn new(batcher: Arc<TelemetryBatcher>, backlog_warn_threshold: usize) -> Self {
        Self {
            batcher,
            backlog_warn_threshold,
        }
    }
}

#[async_trait]
impl Probe for TelemetryProbe {
    fn name(&self) -> &str {
        "telemetry"
    }

    async fn run(&self) -> Result<HealthCheckResult> {
        let snapshot = self.batcher.health_snapshot().await;

        let result = if !snapshot.is_online {
            HealthCheckResult::warn("Telemetry client is offline")
                .with_detail("error_backlog", serde_json::json!(snapshot.error_queue_size))
        } else if snapshot.error_queue_size > self.backlog_warn_threshold {
            HealthCheckResult::warn(format!(
                "Telemetry error backlog at {} (threshold {})",
                snapshot.error_queue_size, self.backlog_warn_threshold
            ))
        } else {
            HealthCheckResult::pass("Telemetry delivery current")
        };
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_core::{ErrorReportDraft, ProbeStatus, PulseConfig};
    use pulse_telemetry::Transport;

    struct NullTransport;

    #[async_trait]
    impl Transport for NullTransport {
        async fn post_json(&self, _url: &str, _body: &serde_json::Value) -> Result<u16> {
            Ok(200)
        }
    }

    fn test_batcher() -> Arc<TelemetryBatcher> {
        Arc::new(TelemetryBatcher::with_transport(
            PulseConfig::default(),
            Arc::new(NullTransport),
        ))
    }

    #[tokio::test]
    async fn test_unconfigured_http_probes_warn() {
        let client = reqwest::Client::new();

        let backend = BackendProbe::new(client.clone(), None, None);
        assert_eq!(backend.run().await.unwrap().status, ProbeStatus::Warn);

        let origin = OriginProbe::new(client.clone(), None);
        assert_eq!(origin.run().await.unwrap().status, ProbeStatus::Warn);

        let auth = AuthProbe::new(client, None);
        assert_eq!(auth.run().await.unwrap().status, ProbeStatus::Warn);
    }

    #[tokio::test]
    async fn test_storage_probe_roundtrip_passes() {
        let dir = tempfile::tempdir().unwrap();
        let probe = StorageProbe::new(dir.path().to_path_buf());

        let result = probe.run().await.unwrap();
        assert_eq!(result.status, ProbeStatus::Pass);
        // Sentinel is cleaned up after the round trip
        assert!(!dir.path().join(SENTINEL_FILE).exists());
    }

    #[tokio::test]
    async fn test_storage_probe_unwritable_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the storage dir should be makes every write fail
        let blocked = dir.path().join("blocked");
        std::fs::write(&blocked, "not a directory").unwrap();

        let probe = StorageProbe::new(blocked);
        let result = probe.run().await.unwrap();
        assert_eq!(result.status, ProbeStatus::Fail);
    }

    #[tokio::test]
    async fn test_storage_probe_corrupted_sentinel_fails() {
        let dir = tempfile::tempdir().unwrap();
        let probe = StorageProbe::corrupting(dir.path().to_path_buf());

        let result = probe.run().await.unwrap();
        assert_eq!(result.status, ProbeStatus::Fail);
        assert!(result.message.contains("mismatch"));
    }

    #[tokio::test]
    async fn test_telemetry_probe_passes_when_current() {
        let probe = TelemetryProbe::new(test_batcher(), 50);
        let result = probe.run().await.unwrap();
        assert_eq!(result.status, ProbeStatus::Pass);
    }

    #[tokio::test]
    async fn test_telemetry_probe_warns_when_offline() {
        let batcher = test_batcher();
        batcher.set_online(false).await;

        let probe = TelemetryProbe::new(batcher, 50);
        let result = probe.run().await.unwrap();
        assert_eq!(result.status, ProbeStatus::Warn);
    }

    #[tokio::test]
    async fn test_telemetry_probe_warns_on_backlog() {
        // Collector down: every flush fails and requeues, so the backlog
        // grows past the threshold while the client stays online.
        struct FailingTransport;

        #[async_trait]
        impl Transport for FailingTransport {
            async fn post_json(&self, _url: &str, _body: &serde_json::Value) -> Result<u16> {
                Err(pulse_core::PulseError::Transport(
                    "connection refused".to_string(),
                ))
            }
        }

        let mut config = PulseConfig::default();
        config.endpoints.errors_url = Some("https://collect.example.com/errors".to_string());
        let batcher = Arc::new(TelemetryBatcher::with_transport(
            config,
            Arc::new(FailingTransport),
        ));

        for i in 0..60 {
            batcher
                .report_error(ErrorReportDraft::message(format!("error {}", i)))
                .await;
        }

        let probe = TelemetryProbe::new(batcher, 50);
        let result = probe.run().await.unwrap();
        assert_eq!(result.status, ProbeStatus::Warn);
    }
}

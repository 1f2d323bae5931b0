//! Telemetry batcher
//!
//! Collects error reports and performance metrics from anywhere in the host
//! application and delivers them to the configured collector in batches.
//! Delivery is triggered by queue thresholds, critical errors, regained
//! connectivity, and explicit host flush points; a failed delivery requeues
//! the batch in front of anything enqueued meanwhile.
//!
//! The batcher is constructed once at startup, shared behind an `Arc`, and
//! torn down with [`TelemetryBatcher::shutdown`], which flushes both queues.

use chrono::Utc;
use pulse_core::{
    ErrorReport, ErrorReportDraft, PerformanceMetric, PulseConfig, PulseError, Result, Severity,
    TelemetrySnapshot,
};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::stats::RequestStats;
use crate::transport::{HttpTransport, Transport};

const FALLBACK_MESSAGE: &str = "Unknown error";

/// Batching collector for error and performance telemetry
///
/// All reporting entry points are infallible: delivery failures are recovered
/// by requeueing and logged, never surfaced to the call site.
pub struct TelemetryBatcher {
    config: PulseConfig,
    transport: Arc<dyn Transport>,
    /// Generated once per process lifetime, stamped on every report
    session_id: String,
    /// Default `url` field for reports that do not supply one
    instance_url: String,
    /// Default client identification string
    user_agent: String,
    /// Written only by `set_online`; read by the health aggregator
    online: AtomicBool,
    user_id: RwLock<Option<String>>,
    errors: Mutex<Vec<ErrorReport>>,
    metrics: Mutex<Vec<PerformanceMetric>>,
    stats: RequestStats,
}

impl TelemetryBatcher {
    /// Create a batcher with the production HTTP transport
    pub fn new(config: PulseConfig) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new()?);
        Ok(Self::with_transport(config, transport))
    }

    /// Create a batcher with an injected transport (tests, embedding)
    pub fn with_transport(config: PulseConfig, transport: Arc<dyn Transport>) -> Self {
        let instance_url = config
            .probes
            .origin_url
            .clone()
            .unwrap_or_else(|| "app://pulse".to_string());
        let user_agent = format!(
            "pulse/{} ({} {})",
            env!("CARGO_PKG_VERSION"),
            std::env::consts::OS,
            std::env::consts::ARCH
        );

        Self {
            config,
            transport,
            session_id: Uuid::new_v4().to_string(),
            instance_url,
            user_agent,
            online: AtomicBool::new(true),
            user_id: RwLock::new(None),
            errors: Mutex::new(Vec::new()),
            metrics: Mutex::new(Vec::new()),
            stats: RequestStats::new(),
        }
    }

    /// Session identifier, stable for the process lifetime
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Request counters feeding the aggregate health metrics
    pub fn stats(&self) -> &RequestStats {
        &self.stats
    }

    /// Whether the client currently believes it is online
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Relaxed)
    }

    /// Record a network-status transition.
    ///
    /// Regaining connectivity flushes both queues once; going offline
    /// disables delivery (flush attempts become no-ops) until connectivity
    /// returns.
    pub async fn set_online(&self, online: bool) {
        let was_online = self.online.swap(online, Ordering::Relaxed);
        if online && !was_online {
            info!("Connectivity regained, flushing pending telemetry");
            self.flush_all().await;
        } else if !online && was_online {
            debug!("Connectivity lost, telemetry delivery disabled");
        }
    }

    /// Attach a user identity to all subsequently created reports.
    ///
    /// Reports already queued keep the identity (or absence of one) they were
    /// created with.
    pub async fn set_user_id(&self, user_id: Option<String>) {
        *self.user_id.write().await = user_id;
    }

    /// Capture an error report.
    ///
    /// Unset draft fields are filled with defaults: capture time, the process
    /// session id, the configured instance location and client string, and
    /// medium severity. Critical reports flush immediately; otherwise the
    /// queue is flushed once it reaches the configured threshold.
    pub async fn report_error(&self, draft: ErrorReportDraft) {
        let report = self.complete_draft(draft).await;
        let severity = report.severity;

        let queue_len = {
            let mut queue = self.errors.lock().await;
            queue.push(report);
            queue.len()
        };

        if severity == Severity::Critical {
            debug!("Critical error reported, flushing immediately");
            self.flush_errors().await;
        } else if queue_len >= self.config.telemetry.error_flush_threshold {
            self.flush_errors().await;
        }
    }

    /// Capture a caught host error (error boundaries, failed async work).
    ///
    /// This is the explicit entry point replacing an ambient uncaught-error
    /// hook; every capture becomes a high-severity report.
    pub async fn capture_error(&self, error: impl std::fmt::Display, component: Option<&str>) {
        let mut draft = ErrorReportDraft::message(error.to_string()).severity(Severity::High);
        if let Some(component) = component {
            draft = draft.component(component);
        }
        self.report_error(draft).await;
    }

    /// Install a panic hook that records each panic as a high-severity
    /// report before delegating to the previous hook.
    ///
    /// This is the one piece of global state the batcher touches, and only
    /// because the host asked for it explicitly. Must be called from within
    /// the tokio runtime that owns the batcher.
    pub fn capture_panics(self: &Arc<Self>) {
        let batcher = Arc::downgrade(self);
        let handle = tokio::runtime::Handle::current();
        let previous = std::panic::take_hook();

        std::panic::set_hook(Box::new(move |info| {
            if let Some(batcher) = batcher.upgrade() {
                let message = info
                    .payload()
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| info.payload().downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "panic with non-string payload".to_string());

                let mut draft = ErrorReportDraft::message(message)
                    .severity(Severity::High)
                    .component("panic");
                if let Some(location) = info.location() {
                    draft = draft.context_value(
                        "location",
                        serde_json::json!(format!(
                            "{}:{}:{}",
                            location.file(),
                            location.line(),
                            location.column()
                        )),
                    );
                }

                handle.spawn(async move { batcher.report_error(draft).await });
            }
            previous(info);
        }));
    }

    /// Record a performance measurement; flushes the metric queue once it
    /// reaches the configured threshold.
    ///
    /// The process session id is stamped on the metric at enqueue time,
    /// replacing whatever the caller supplied, so every delivered metric
    /// carries the same id as the error reports.
    pub async fn report_performance(&self, mut metric: PerformanceMetric) {
        metric.session_id = self.session_id.clone();

        let queue_len = {
            let mut queue = self.metrics.lock().await;
            queue.push(metric);
            queue.len()
        };

        if queue_len >= self.config.telemetry.metric_flush_threshold {
            self.flush_metrics().await;
        }
    }

    /// Send a custom event, fire-and-forget.
    ///
    /// Events are only delivered when the client is online and running in
    /// production; otherwise the event is logged locally and dropped.
    /// Returns whether the event was handed to the network, so operator
    /// surfaces can tell a dispatched event from a locally-logged one.
    /// Delivery itself is still fire-and-forget and never fails the caller.
    pub async fn report_custom_event(&self, name: &str, data: serde_json::Value) -> bool {
        if !self.is_online() || !self.config.is_production() {
            debug!("Custom event '{}' logged locally (offline or non-production)", name);
            return false;
        }

        let Some(url) = self.config.endpoints.events_url.clone() else {
            debug!("Custom event '{}' dropped, no events endpoint configured", name);
            return false;
        };

        let body = serde_json::json!({
            "name": name,
            "timestamp": Utc::now(),
            "url": self.instance_url,
            "session_id": self.session_id,
            "user_id": self.user_id.read().await.clone(),
            "data": data,
        });

        let transport = self.transport.clone();
        let name = name.to_string();
        tokio::spawn(async move {
            if let Err(e) = transport.post_json(&url, &body).await {
                debug!("Custom event '{}' delivery failed: {}", name, e);
            }
        });
        true
    }

    /// Point-in-time view of the batcher. Pure read, no side effects.
    pub async fn health_snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            session_id: self.session_id.clone(),
            is_online: self.is_online(),
            error_queue_size: self.errors.lock().await.len(),
            performance_queue_size: self.metrics.lock().await.len(),
            user_id: self.user_id.read().await.clone(),
        }
    }

    /// Flush both queues. The host calls this at its last reliable point
    /// before suspending (window hidden, SIGTERM), and it runs again inside
    /// [`shutdown`](Self::shutdown).
    pub async fn flush_all(&self) {
        self.flush_errors().await;
        self.flush_metrics().await;
    }

    /// Flush pending telemetry and release the batcher.
    pub async fn shutdown(&self) {
        info!("Telemetry batcher shutting down, flushing pending queues");
        self.flush_all().await;
    }

    async fn flush_errors(&self) {
        self.flush_queue(&self.errors, self.config.endpoints.errors_url.as_deref(), "errors")
            .await;
    }

    async fn flush_metrics(&self) {
        self.flush_queue(
            &self.metrics,
            self.config.endpoints.metrics_url.as_deref(),
            "metrics",
        )
        .await;
    }

    /// Snapshot-and-clear flush shared by both queues.
    ///
    /// The snapshot and clear happen under the queue lock, so no concurrent
    /// enqueue can be lost; delivery runs without the lock. On failure the
    /// snapshot is restored in front of anything enqueued during the attempt.
    async fn flush_queue<T: Serialize>(
        &self,
        queue: &Mutex<Vec<T>>,
        url: Option<&str>,
        kind: &'static str,
    ) {
        if !self.is_online() {
            debug!("Offline, skipping {} flush", kind);
            return;
        }

        let snapshot = {
            let mut queue = queue.lock().await;
            if queue.is_empty() {
                return;
            }
            std::mem::take(&mut *queue)
        };
        let count = snapshot.len();

        match self.deliver(url, &snapshot, kind).await {
            Ok(()) => debug!("Delivered {} batch ({} items)", kind, count),
            Err(e) => {
                warn!("Failed to deliver {} batch ({} items), requeued: {}", kind, count, e);
                let mut queue = queue.lock().await;
                let mut restored = snapshot;
                restored.append(&mut queue);
                *queue = restored;
            }
        }
    }

    async fn deliver<T: Serialize>(&self, url: Option<&str>, batch: &[T], kind: &str) -> Result<()> {
        let Some(url) = url else {
            // Diagnostic-log mode: unconfigured deployments trace the batch
            // instead of shipping it.
            debug!("No {} endpoint configured, batch of {} logged locally", kind, batch.len());
            return Ok(());
        };

        let mut body = serde_json::Map::new();
        body.insert(kind.to_string(), serde_json::to_value(batch)?);

        let status = self
            .transport
            .post_json(url, &serde_json::Value::Object(body))
            .await?;
        if (200..300).contains(&status) {
            Ok(())
        } else {
            Err(PulseError::CollectorStatus(status))
        }
    }

    async fn complete_draft(&self, draft: ErrorReportDraft) -> ErrorReport {
        let user_id = match draft.user_id {
            Some(id) => Some(id),
            None => self.user_id.read().await.clone(),
        };

        ErrorReport {
            message: draft
                .message
                .unwrap_or_else(|| FALLBACK_MESSAGE.to_string()),
            stack: draft.stack,
            url: draft.url.unwrap_or_else(|| self.instance_url.clone()),
            user_agent: draft
                .user_agent
                .unwrap_or_else(|| self.user_agent.clone()),
            timestamp: draft.timestamp.unwrap_or_else(Utc::now),
            session_id: self.session_id.clone(),
            user_id,
            component: draft.component,
            severity: draft.severity.unwrap_or_default(),
            context: draft.context,
        }
    }

    #[cfg(test)]
    pub(crate) async fn queued_error_messages(&self) -> Vec<String> {
        self.errors
            .lock()
            .await
            .iter()
            .map(|r| r.message.clone())
            .collect()
    }
}

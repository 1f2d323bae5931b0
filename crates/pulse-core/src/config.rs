//! Configuration management for Pulse
//!
//! This module provides configuration structures for a deployed Pulse
//! instance: collector endpoints, probe targets, batching thresholds and the
//! storage location used by the persistence probe.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{PulseError, Result};

/// Deployment-level Pulse configuration
///
/// Loaded from `pulse.toml`. Every field has a default so an unconfigured
/// (demo) instance still runs; missing endpoints degrade the corresponding
/// behavior rather than failing it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PulseConfig {
    /// Deployment environment label ("production" enables network delivery
    /// of custom events)
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Collector endpoints
    #[serde(default)]
    pub endpoints: EndpointsConfig,

    /// Health probe targets
    #[serde(default)]
    pub probes: ProbesConfig,

    /// Batching thresholds
    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Directory used by the persistent-storage probe sentinel
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,
}

/// Remote collector endpoints; all optional, unset in demo runs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointsConfig {
    /// Error batch collector
    #[serde(default)]
    pub errors_url: Option<String>,

    /// Performance metric batch collector
    #[serde(default)]
    pub metrics_url: Option<String>,

    /// Custom event collector
    #[serde(default)]
    pub events_url: Option<String>,
}

/// Health probe targets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbesConfig {
    /// Backend base URL; unset degrades the backend probe to warn
    #[serde(default)]
    pub backend_url: Option<String>,

    /// API key sent to the backend probe target
    #[serde(default)]
    pub backend_api_key: Option<String>,

    /// The application's own origin
    #[serde(default)]
    pub origin_url: Option<String>,

    /// Auth-service settings endpoint; unset degrades the auth probe to warn
    #[serde(default)]
    pub auth_settings_url: Option<String>,

    /// Per-probe timeout in seconds
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
}

/// Batching thresholds for the telemetry batcher
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Flush the error queue once it reaches this length
    #[serde(default = "default_error_flush_threshold")]
    pub error_flush_threshold: usize,

    /// Flush the metric queue once it reaches this length
    #[serde(default = "default_metric_flush_threshold")]
    pub metric_flush_threshold: usize,

    /// Error backlog above which the telemetry self-check reports warn
    #[serde(default = "default_error_backlog_warn_threshold")]
    pub error_backlog_warn_threshold: usize,
}

// Default value providers
fn default_environment() -> String {
    "development".to_string()
}

fn default_storage_dir() -> PathBuf {
    std::env::temp_dir().join("pulse")
}

fn default_probe_timeout_secs() -> u64 {
    5
}

fn default_error_flush_threshold() -> usize {
    10
}

fn default_metric_flush_threshold() -> usize {
    20
}

fn default_error_backlog_warn_threshold() -> usize {
    50
}

impl PulseConfig {
    /// Load configuration from the given path or use defaults
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content)
                .map_err(|e| PulseError::Config(format!("Failed to parse config file: {}", e)))
        } else {
            Ok(Self::default())
        }
    }

    /// Write a default configuration file to the given path
    pub fn write_default(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let config = Self::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| PulseError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Whether this instance runs in production mode
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            endpoints: EndpointsConfig::default(),
            probes: ProbesConfig::default(),
            telemetry: TelemetryConfig::default(),
            storage_dir: default_storage_dir(),
        }
    }
}

impl Default for ProbesConfig {
    fn default() -> Self {
        Self {
            backend_url: None,
            backend_api_key: None,
            origin_url: None,
            auth_settings_url: None,
            probe_timeout_secs: default_probe_timeout_secs(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            error_flush_threshold: default_error_flush_threshold(),
            metric_flush_threshold: default_metric_flush_threshold(),
            error_backlog_warn_threshold: default_error_backlog_warn_threshold(),
        }
    }
}

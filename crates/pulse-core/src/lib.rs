//! # pulse-core
//!
//! Core types for the Pulse client observability kit.
//!
//! Pulse delivers two loosely coupled services to a host application:
//!
//! - Telemetry batching: error reports and performance metrics are collected
//!   in-process and shipped to a remote collector in batches that survive
//!   transient network loss.
//! - Health aggregation: a fixed battery of independent probes is reduced to
//!   a single healthy/degraded/unhealthy verdict for dashboards and monitors.
//!
//! This crate holds the data model, configuration and error type shared by
//! both services.

mod config;
mod error;
mod types;

pub use config::{
    EndpointsConfig, ProbesConfig, PulseConfig, TelemetryConfig,
};
pub use error::{PulseError, Result};
pub use types::*;

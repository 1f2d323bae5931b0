//! # pulse-health
//!
//! Composite health checking for Pulse.
//!
//! A fixed battery of independent probes (backend reachability, own origin,
//! local storage, auth endpoint, telemetry self-check) runs concurrently and
//! is reduced to a single healthy/degraded/unhealthy verdict. The aggregate
//! call never fails: probe errors, timeouts and panics all become `fail`
//! entries in an otherwise complete result.

mod aggregator;
mod probes;

pub use aggregator::HealthAggregator;
pub use probes::{
    AuthProbe, BackendProbe, OriginProbe, Probe, StorageProbe, TelemetryProbe,
};

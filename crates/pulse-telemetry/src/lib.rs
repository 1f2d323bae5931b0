//! # pulse-telemetry
//!
//! Batched error and performance telemetry for Pulse.
//!
//! The [`TelemetryBatcher`] accumulates error reports and performance metrics
//! in memory and ships them to a remote collector when a queue reaches its
//! threshold, when a critical error arrives, when connectivity returns, or
//! when the host flushes explicitly at suspend/shutdown. Delivery failures
//! requeue the batch; nothing is ever surfaced to the reporting call sites.

mod batcher;
mod stats;
mod transport;

pub use batcher::TelemetryBatcher;
pub use stats::RequestStats;
pub use transport::{HttpTransport, Transport};

//! Unified error types for Pulse

use thiserror::Error;

/// Unified error type for all Pulse operations
///
/// The public batcher and aggregator entry points never surface these to the
/// host; they exist for internal plumbing, the CLI boundary and config loads.
#[derive(Error, Debug)]
pub enum PulseError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Delivery errors
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Collector rejected batch: HTTP {0}")]
    CollectorStatus(u16),

    // Health probe errors
    #[error("Probe error: {0}")]
    Probe(String),

    #[error("Storage check error: {0}")]
    Storage(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(String),
}

/// Result type alias using PulseError
pub type Result<T> = std::result::Result<T, PulseError>;

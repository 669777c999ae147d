//! Error types for Stress Sense

use thiserror::Error;

/// Errors that can occur at the fallible boundaries of the engine
/// (parsing, persistence, calibration).
///
/// Feature extraction, normalization and scoring never fail: degenerate
/// inputs map to defined zero/default outputs instead.
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Failed to parse session payload: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No data to calibrate: {0}")]
    EmptySession(String),

    #[error("Baseline store error: {0}")]
    BaselineError(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}

/// Errors reported by the event capture layer.
///
/// Not fatal: a capture that fails to register simply produces an empty
/// session.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Input subsystem unavailable: {0}")]
    SourceUnavailable(String),
}

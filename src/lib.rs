//! Stress Sense - On-device stress inference from input-device behavior
//!
//! Stress Sense turns passively captured pointer and keyboard events into a
//! stress estimate through a deterministic pipeline: event capture → feature
//! extraction → baseline normalization → score fusion.
//!
//! ## Flows
//!
//! - **Calibration**: record a session of typical behavior and store its
//!   features as the personal baseline
//! - **Analysis**: score a session relative to the baseline, or with fixed
//!   heuristics before one exists

pub mod baseline;
pub mod capture;
pub mod config;
pub mod encoder;
pub mod error;
pub mod features;
pub mod normalizer;
pub mod pipeline;
pub mod scorer;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use baseline::{BaselineStore, FileBaselineStore, MemoryBaselineStore};
pub use capture::{CaptureSink, EventCapture, HostNotification, InputSource};
pub use config::EngineConfig;
pub use error::{CaptureError, ComputeError};
pub use features::FeatureExtractor;
pub use normalizer::ZScoreNormalizer;
pub use pipeline::{analyze_session_json, calibrate_session_json, StressProcessor};
pub use scorer::StressScorer;
pub use types::{AnalysisReport, FeatureVector, KeyEvent, Session, StressScore, ZScoreVector};

/// Version embedded in all encoded reports
pub const STRESS_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for encoded reports
pub const PRODUCER_NAME: &str = "stress-sense";

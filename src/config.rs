//! Engine configuration
//!
//! Settings load from an optional JSON file; every field has a default so a
//! partial file (or none at all) is valid.

use crate::error::ComputeError;
use crate::scorer::{HeuristicThresholds, ScoringWeights, StressScorer};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default capture window in seconds
pub const DEFAULT_SESSION_DURATION_SECS: u64 = 60;

/// Default directory for the baseline and archived sessions
pub const DEFAULT_DATA_DIR: &str = "data";

/// Default baseline file name inside the data directory
pub const DEFAULT_BASELINE_FILE: &str = "baseline.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Length of a capture session
    pub session_duration_secs: u64,
    pub data_dir: PathBuf,
    /// Baseline file, relative to `data_dir` unless absolute
    pub baseline_file: PathBuf,
    /// Keep a copy of every submitted session in `data_dir`
    pub archive_sessions: bool,
    pub weights: ScoringWeights,
    pub thresholds: HeuristicThresholds,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            session_duration_secs: DEFAULT_SESSION_DURATION_SECS,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            baseline_file: PathBuf::from(DEFAULT_BASELINE_FILE),
            archive_sessions: true,
            weights: ScoringWeights::default(),
            thresholds: HeuristicThresholds::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ComputeError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self, ComputeError> {
        match fs::read_to_string(path) {
            Ok(json) => Self::from_json(&json),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn validate(&self) -> Result<(), ComputeError> {
        if self.session_duration_secs == 0 {
            return Err(ComputeError::ConfigError(
                "session_duration_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn session_duration(&self) -> Duration {
        Duration::from_secs(self.session_duration_secs)
    }

    pub fn baseline_path(&self) -> PathBuf {
        self.data_dir.join(&self.baseline_file)
    }

    /// Directory for archived submissions, if archiving is on
    pub fn archive_dir(&self) -> Option<PathBuf> {
        self.archive_sessions.then(|| self.data_dir.clone())
    }

    pub fn scorer(&self) -> StressScorer {
        StressScorer::new(self.weights.clone(), self.thresholds.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.session_duration(), Duration::from_secs(60));
        assert_eq!(config.baseline_path(), PathBuf::from("data/baseline.json"));
        assert_eq!(config.archive_dir(), Some(PathBuf::from("data")));
    }

    #[test]
    fn test_partial_json() {
        let config = EngineConfig::from_json(
            r#"{"session_duration_secs": 180, "weights": {"flight_std": 0.8}}"#,
        )
        .unwrap();

        assert_eq!(config.session_duration_secs, 180);
        assert_eq!(config.weights.flight_std, 0.8);
        assert_eq!(config.weights.acc_std, 0.3);
        assert_eq!(config.thresholds, HeuristicThresholds::default());
    }

    #[test]
    fn test_absolute_baseline_file() {
        let config = EngineConfig::from_json(r#"{"baseline_file": "/var/lib/stress/base.json"}"#)
            .unwrap();
        assert_eq!(
            config.baseline_path(),
            PathBuf::from("/var/lib/stress/base.json")
        );
    }

    #[test]
    fn test_zero_duration_rejected() {
        let result = EngineConfig::from_json(r#"{"session_duration_secs": 0}"#);
        assert!(matches!(result, Err(ComputeError::ConfigError(_))));
    }

    #[test]
    fn test_load_missing_file_defaults() {
        let dir = tempdir().unwrap();
        let config = EngineConfig::load(&dir.path().join("stress.json")).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_load_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stress.json");
        fs::write(&path, r#"{"archive_sessions": false, "data_dir": "/tmp/s"}"#).unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.archive_dir(), None);
        assert_eq!(config.baseline_path(), PathBuf::from("/tmp/s/baseline.json"));
    }
}

//! Baseline persistence
//!
//! A baseline is the feature vector of one calibration session. There is at
//! most one: every calibration overwrites it wholesale. Stores are injected
//! into the processor so tests can swap the file-backed store for an
//! in-memory one.

use crate::error::ComputeError;
use crate::types::FeatureVector;
use parking_lot::Mutex;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Storage for the single active baseline
pub trait BaselineStore {
    /// Replace the stored baseline
    fn save(&self, features: &FeatureVector) -> Result<(), ComputeError>;

    /// The stored baseline; `None` when never saved or unreadable
    fn load(&self) -> Option<FeatureVector>;

    /// Forget the stored baseline
    fn clear(&self) -> Result<(), ComputeError>;
}

impl<S: BaselineStore + ?Sized> BaselineStore for &S {
    fn save(&self, features: &FeatureVector) -> Result<(), ComputeError> {
        (**self).save(features)
    }

    fn load(&self) -> Option<FeatureVector> {
        (**self).load()
    }

    fn clear(&self) -> Result<(), ComputeError> {
        (**self).clear()
    }
}

/// Baseline kept as a flat JSON object on disk
#[derive(Debug, Clone)]
pub struct FileBaselineStore {
    path: PathBuf,
}

impl FileBaselineStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a record exists at all (it may still be unreadable)
    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}

impl BaselineStore for FileBaselineStore {
    fn save(&self, features: &FeatureVector) -> Result<(), ComputeError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        // Write beside the target, then rename over it
        let mut tmp = NamedTempFile::new_in(&dir)?;
        let json = serde_json::to_vec_pretty(features)?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)
            .map_err(|e| ComputeError::BaselineError(e.to_string()))?;

        tracing::info!(
            path = %self.path.display(),
            features = features.len(),
            "baseline saved"
        );
        Ok(())
    }

    fn load(&self) -> Option<FeatureVector> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no baseline recorded");
                return None;
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "baseline unreadable");
                return None;
            }
        };

        match serde_json::from_str::<FeatureVector>(&content) {
            Ok(features) => Some(features),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "baseline corrupt, ignoring");
                None
            }
        }
    }

    fn clear(&self) -> Result<(), ComputeError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::info!(path = %self.path.display(), "baseline cleared");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process baseline, used for stateless calls and tests
#[derive(Debug, Default)]
pub struct MemoryBaselineStore {
    baseline: Mutex<Option<FeatureVector>>,
}

impl MemoryBaselineStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with a baseline
    pub fn with_baseline(features: FeatureVector) -> Self {
        Self {
            baseline: Mutex::new(Some(features)),
        }
    }
}

impl BaselineStore for MemoryBaselineStore {
    fn save(&self, features: &FeatureVector) -> Result<(), ComputeError> {
        *self.baseline.lock() = Some(features.clone());
        Ok(())
    }

    fn load(&self) -> Option<FeatureVector> {
        self.baseline.lock().clone()
    }

    fn clear(&self) -> Result<(), ComputeError> {
        *self.baseline.lock() = None;
        Ok(())
    }
}

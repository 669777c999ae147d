//! Pipeline orchestration
//!
//! This module provides the public API for Stress Sense. It wires the stages
//! together for the two flows:
//!
//! 1. Calibration: Session → FeatureExtractor → BaselineStore
//! 2. Analysis: Session → FeatureExtractor → ZScoreNormalizer (if a baseline
//!    exists) → StressScorer → AnalysisReport

use crate::baseline::{BaselineStore, FileBaselineStore, MemoryBaselineStore};
use crate::config::EngineConfig;
use crate::encoder::feature_summary;
use crate::error::ComputeError;
use crate::features::FeatureExtractor;
use crate::normalizer::ZScoreNormalizer;
use crate::scorer::StressScorer;
use crate::types::{AnalysisReport, CalibrationReport, FeatureVector, Session, SessionSubmission};
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Parse a session submission JSON string
pub fn parse_submission(json: &str) -> Result<SessionSubmission, ComputeError> {
    serde_json::from_str(json)
        .map_err(|e| ComputeError::ParseError(format!("Failed to parse session: {}", e)))
}

/// Analyze a submission against an optional baseline (stateless, one-shot).
///
/// # Example
/// ```ignore
/// let report = analyze_session_json(session_json, None)?;
/// println!("{:.2}", report.stress_score.value());
/// ```
pub fn analyze_session_json(
    session_json: &str,
    baseline: Option<&FeatureVector>,
) -> Result<AnalysisReport, ComputeError> {
    let store = match baseline {
        Some(features) => MemoryBaselineStore::with_baseline(features.clone()),
        None => MemoryBaselineStore::new(),
    };
    StressProcessor::new(store).submit(session_json)
}

/// Compute the baseline a submission would calibrate to, without storing it
pub fn calibrate_session_json(session_json: &str) -> Result<CalibrationReport, ComputeError> {
    StressProcessor::new(MemoryBaselineStore::new()).calibrate_json(session_json)
}

/// Stateful processor bound to a baseline store
pub struct StressProcessor<S: BaselineStore> {
    store: S,
    scorer: StressScorer,
    archive_dir: Option<PathBuf>,
}

impl StressProcessor<FileBaselineStore> {
    /// Processor using the file baseline, scoring and archive settings of `config`
    pub fn from_config(config: &EngineConfig) -> Self {
        let mut processor = Self::new(FileBaselineStore::new(config.baseline_path()))
            .with_scorer(config.scorer());
        processor.archive_dir = config.archive_dir();
        processor
    }
}

impl<S: BaselineStore> StressProcessor<S> {
    /// Processor with default scoring and no archiving
    pub fn new(store: S) -> Self {
        Self {
            store,
            scorer: StressScorer::default(),
            archive_dir: None,
        }
    }

    pub fn with_scorer(mut self, scorer: StressScorer) -> Self {
        self.scorer = scorer;
        self
    }

    /// Archive every submission under `dir`
    pub fn with_archive_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.archive_dir = Some(dir.into());
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Extract features from a calibration session and store them as the baseline
    pub fn calibrate(&self, session: &Session) -> Result<CalibrationReport, ComputeError> {
        if session.is_empty() {
            return Err(ComputeError::EmptySession(
                "session has no movements and no keystrokes".to_string(),
            ));
        }

        let baseline = FeatureExtractor::extract(session);
        self.store.save(&baseline)?;
        tracing::info!(features = baseline.len(), "calibrated new baseline");

        Ok(CalibrationReport {
            calibrated_at: Utc::now(),
            baseline,
        })
    }

    /// Parse a submission and calibrate from it
    pub fn calibrate_json(&self, json: &str) -> Result<CalibrationReport, ComputeError> {
        let submission = parse_submission(json)?;
        self.calibrate(&submission.to_session())
    }

    /// Score a session against the stored baseline, or heuristically without one
    pub fn analyze(&self, session: &Session) -> AnalysisReport {
        let features = FeatureExtractor::extract(session);

        let z_scores = match self.store.load() {
            Some(baseline) => Some(ZScoreNormalizer::normalize(&features, &baseline)),
            None => {
                tracing::info!("no baseline yet, using heuristic scoring");
                None
            }
        };

        let (stress_score, scoring_path) = self.scorer.score(&features, z_scores.as_ref());
        tracing::info!(
            score = stress_score.value(),
            path = ?scoring_path,
            data_points = session.data_points(),
            "session analyzed"
        );

        AnalysisReport {
            session_id: Uuid::new_v4().to_string(),
            computed_at: Utc::now(),
            data_points: session.data_points(),
            features,
            z_scores: z_scores.unwrap_or_default(),
            stress_score,
            scoring_path,
            archived_to: None,
            assessment_summary: None,
        }
    }

    /// Full submission flow: parse, archive, analyze, attach summary on request
    pub fn submit(&self, json: &str) -> Result<AnalysisReport, ComputeError> {
        let submission = parse_submission(json)?;
        Ok(self.process_submission(&submission))
    }

    /// Archive and analyze an already decoded submission
    pub fn process_submission(&self, submission: &SessionSubmission) -> AnalysisReport {
        let mut report = self.analyze(&submission.to_session());

        if let Some(dir) = &self.archive_dir {
            match archive_submission(dir, &report.session_id, submission) {
                Ok(path) => report.archived_to = Some(path.display().to_string()),
                Err(e) => tracing::warn!(dir = %dir.display(), error = %e, "failed to archive session"),
            }
        }

        if submission.analyze_with_llm {
            report.assessment_summary = Some(feature_summary(&report.features, &report.z_scores));
        }

        report
    }
}

/// Write the submission to `dir/session_<unix-seconds>_<id>.json`
fn archive_submission(
    dir: &Path,
    session_id: &str,
    submission: &SessionSubmission,
) -> Result<PathBuf, ComputeError> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!(
        "session_{}_{}.json",
        Utc::now().timestamp(),
        session_id
    ));
    fs::write(&path, serde_json::to_vec(submission)?)?;
    tracing::debug!(path = %path.display(), "session archived");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::names::*;
    use crate::types::{ClickEvent, MovementEvent, ScoringPath};
    use tempfile::tempdir;

    fn sample_session_json() -> &'static str {
        r#"{
            "movements": [
                {"x": 100, "y": 100, "timestamp": 1700000000.00},
                {"x": 110, "y": 104, "timestamp": 1700000000.05},
                {"x": 125, "y": 98, "timestamp": 1700000000.10},
                {"x": 150, "y": 120, "timestamp": 1700000000.20},
                {"x": 180, "y": 140, "timestamp": 1700000000.40},
                {"x": 181, "y": 141, "timestamp": 1700000001.10},
                {"x": 230, "y": 170, "timestamp": 1700000001.30},
                {"x": 260, "y": 160, "timestamp": 1700000001.60}
            ],
            "clicks": [
                {"x": 180, "y": 140, "timestamp": 1700000000.55, "button": "left"}
            ],
            "keystrokes": [
                {"key": "h", "hold_time": 0.09, "timestamp": 1700000002.00},
                {"key": "i", "hold_time": 0.11, "timestamp": 1700000002.21},
                {"key": "Backspace", "hold_time": 0.08, "timestamp": 1700000002.50},
                {"key": "i", "hold_time": 0.10, "timestamp": 1700000002.72}
            ],
            "analyze_with_llm": false
        }"#
    }

    #[test]
    fn test_stateless_analysis_without_baseline() {
        let report = analyze_session_json(sample_session_json(), None).unwrap();

        assert_eq!(report.scoring_path, ScoringPath::Heuristic);
        assert!(report.z_scores.is_empty());
        assert_eq!(report.data_points, 12);
        assert_eq!(report.features.get(MOUSE_POINTS), 8.0);
        assert_eq!(report.features.get(KEY_BACKSPACE_COUNT), 1.0);

        let score = report.stress_score.value();
        assert!((0.0..=1.0).contains(&score));
        assert!(report.assessment_summary.is_none());
    }

    #[test]
    fn test_calibrate_then_analyze_same_session_is_neutral() {
        let processor = StressProcessor::new(MemoryBaselineStore::new());

        let calibration = processor.calibrate_json(sample_session_json()).unwrap();
        assert_eq!(processor.store().load(), Some(calibration.baseline.clone()));

        let report = processor.submit(sample_session_json()).unwrap();
        assert_eq!(report.scoring_path, ScoringPath::Baseline);
        assert!(report.baseline_present());
        assert!(report.z_scores.iter().all(|(_, z)| z.abs() < 1e-9));
        assert!((report.stress_score.value() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_calibrate_empty_session_fails() {
        let processor = StressProcessor::new(MemoryBaselineStore::new());
        let result = processor.calibrate_json(r#"{"movements": [], "clicks": [{"x": 1, "y": 1, "timestamp": 1}]}"#);

        assert!(matches!(result, Err(ComputeError::EmptySession(_))));
        assert_eq!(processor.store().load(), None);
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            analyze_session_json("not valid json", None),
            Err(ComputeError::ParseError(_))
        ));
        // movements is required
        assert!(analyze_session_json(r#"{"keystrokes": []}"#, None).is_err());
        // An action outside down/up never degrades to a press-only record
        assert!(matches!(
            analyze_session_json(
                r#"{"movements": [], "keystrokes": [{"key": "a", "action": "press", "timestamp": 1.0}]}"#,
                None
            ),
            Err(ComputeError::ParseError(_))
        ));
    }

    #[test]
    fn test_empty_session_analysis() {
        let report = analyze_session_json(r#"{"movements": []}"#, None).unwrap();
        assert_eq!(report.data_points, 0);
        assert_eq!(report.stress_score.value(), 0.5);
        assert_eq!(report.features.get(MOUSE_PATH_EFFICIENCY), 1.0);
    }

    #[test]
    fn test_summary_attached_on_request() {
        let json = sample_session_json().replace(
            "\"analyze_with_llm\": false",
            "\"analyze_with_llm\": true",
        );
        let report = analyze_session_json(&json, None).unwrap();

        let summary = report.assessment_summary.unwrap();
        assert!(summary.contains("- mouse_vel_mean: "));
        assert!(summary.contains("- key_backspace_count: 1.00"));
    }

    #[test]
    fn test_erratic_session_scores_higher_against_baseline() {
        let processor = StressProcessor::new(MemoryBaselineStore::new());
        processor.calibrate_json(sample_session_json()).unwrap();

        // Zig-zag stroke and a slow click relative to calibration
        let stressed = Session::new(
            vec![
                MovementEvent::new(0.0, 0.0, 30.0),
                MovementEvent::new(20.0, 15.0, 30.1),
                MovementEvent::new(0.0, 20.0, 30.2),
                MovementEvent::new(30.0, 5.0, 30.3),
                MovementEvent::new(12.0, 0.0, 30.4),
            ],
            vec![ClickEvent {
                x: 12.0,
                y: 0.0,
                t: 31.0,
                button: "left".to_string(),
            }],
            vec![],
        );

        let report = processor.analyze(&stressed);
        assert_eq!(report.scoring_path, ScoringPath::Baseline);
        assert!(report.z_scores.for_feature(MOUSE_PATH_EFFICIENCY).unwrap() > 1.0);
        assert!(report.z_scores.for_feature(MOUSE_CLICK_LATENCY).unwrap() > 1.0);
        assert!(report.stress_score.value() > 0.9);
    }

    #[test]
    fn test_file_processor_from_config() {
        let dir = tempdir().unwrap();
        let config = EngineConfig {
            data_dir: dir.path().to_path_buf(),
            ..EngineConfig::default()
        };
        let processor = StressProcessor::from_config(&config);

        processor.calibrate_json(sample_session_json()).unwrap();
        assert!(config.baseline_path().exists());

        let report = processor.submit(sample_session_json()).unwrap();
        assert_eq!(report.scoring_path, ScoringPath::Baseline);

        let archived = PathBuf::from(report.archived_to.unwrap());
        assert!(archived.starts_with(dir.path()));
        let saved = parse_submission(&fs::read_to_string(archived).unwrap()).unwrap();
        assert_eq!(saved.movements.len(), 8);
        assert_eq!(saved.keystrokes.len(), 4);
    }

    #[test]
    fn test_corrupt_baseline_falls_back_to_heuristics() {
        let dir = tempdir().unwrap();
        let config = EngineConfig {
            data_dir: dir.path().to_path_buf(),
            archive_sessions: false,
            ..EngineConfig::default()
        };
        fs::write(config.baseline_path(), "garbage").unwrap();

        let report = StressProcessor::from_config(&config)
            .submit(sample_session_json())
            .unwrap();
        assert_eq!(report.scoring_path, ScoringPath::Heuristic);
        assert!(report.archived_to.is_none());
    }

    #[test]
    fn test_archive_failure_keeps_analysis() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        fs::write(&blocker, "x").unwrap();

        let session = parse_submission(sample_session_json()).unwrap().to_session();
        let submission = SessionSubmission::from_session(&session, true);
        let report = StressProcessor::new(MemoryBaselineStore::new())
            .with_archive_dir(&blocker)
            .process_submission(&submission);

        assert!(report.archived_to.is_none());
        assert_eq!(report.data_points, 12);
        assert!(report.assessment_summary.is_some());
    }
}

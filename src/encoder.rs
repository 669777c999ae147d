//! Report encoding
//!
//! Renders analysis results for downstream consumers: JSON for dashboards and
//! transports, and a flat text summary for the qualitative assessment
//! component.

use crate::error::ComputeError;
use crate::types::{AnalysisReport, FeatureVector, ZScoreVector};
use crate::{PRODUCER_NAME, STRESS_VERSION};
use serde::Serialize;
use std::fmt::Write;
use uuid::Uuid;

/// Producer metadata stamped on every encoded report
#[derive(Debug, Clone, Serialize)]
pub struct Producer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

#[derive(Serialize)]
struct EncodedReport<'a> {
    producer: &'a Producer,
    #[serde(flatten)]
    report: &'a AnalysisReport,
}

/// JSON encoder for analysis reports
pub struct ReportEncoder {
    producer: Producer,
}

impl Default for ReportEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self::with_instance_id(Uuid::new_v4().to_string())
    }

    pub fn with_instance_id(instance_id: String) -> Self {
        Self {
            producer: Producer {
                name: PRODUCER_NAME.to_string(),
                version: STRESS_VERSION.to_string(),
                instance_id,
            },
        }
    }

    pub fn encode(&self, report: &AnalysisReport) -> Result<String, ComputeError> {
        serde_json::to_string(&self.wrap(report))
            .map_err(|e| ComputeError::EncodingError(e.to_string()))
    }

    pub fn encode_pretty(&self, report: &AnalysisReport) -> Result<String, ComputeError> {
        serde_json::to_string_pretty(&self.wrap(report))
            .map_err(|e| ComputeError::EncodingError(e.to_string()))
    }

    fn wrap<'a>(&'a self, report: &'a AnalysisReport) -> EncodedReport<'a> {
        EncodedReport {
            producer: &self.producer,
            report,
        }
    }
}

/// One `- name: value` line per feature, then per z-score, two decimals
pub fn feature_summary(features: &FeatureVector, z_scores: &ZScoreVector) -> String {
    let mut summary = String::new();
    for (name, value) in features.iter().chain(z_scores.iter()) {
        // Writing to a String cannot fail
        let _ = writeln!(summary, "- {}: {:.2}", name, value);
    }
    summary.truncate(summary.trim_end().len());
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ScoringPath, StressScore};
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn sample_report() -> AnalysisReport {
        let mut features = FeatureVector::new();
        features.insert("mouse_vel_mean", 412.456);
        features.insert("key_error_rate", 0.05);

        let mut z_scores = ZScoreVector::new();
        z_scores.insert("mouse_vel_mean", -1.5);

        AnalysisReport {
            session_id: "sess-1".to_string(),
            computed_at: Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap(),
            data_points: 42,
            features,
            z_scores,
            stress_score: StressScore::new(0.62),
            scoring_path: ScoringPath::Baseline,
            archived_to: None,
            assessment_summary: None,
        }
    }

    #[test]
    fn test_feature_summary_format() {
        let report = sample_report();
        let summary = feature_summary(&report.features, &report.z_scores);
        assert_eq!(
            summary,
            "- key_error_rate: 0.05\n- mouse_vel_mean: 412.46\n- z_mouse_vel_mean: -1.50"
        );
    }

    #[test]
    fn test_feature_summary_empty() {
        assert_eq!(
            feature_summary(&FeatureVector::new(), &ZScoreVector::new()),
            ""
        );
    }

    #[test]
    fn test_encode_report() {
        let encoder = ReportEncoder::with_instance_id("inst-1".to_string());
        let json = encoder.encode(&sample_report()).unwrap();
        let payload: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(payload["producer"]["name"], PRODUCER_NAME);
        assert_eq!(payload["producer"]["instance_id"], "inst-1");
        assert_eq!(payload["session_id"], "sess-1");
        assert_eq!(payload["data_points"], 42);
        assert_eq!(payload["stress_score"], 0.62);
        assert_eq!(payload["scoring_path"], "baseline");
        assert_eq!(payload["z_scores"]["z_mouse_vel_mean"], -1.5);
        assert!(payload.get("assessment_summary").is_none());
    }

    #[test]
    fn test_encode_pretty_matches_compact() {
        let encoder = ReportEncoder::new();
        let report = sample_report();
        let compact: serde_json::Value =
            serde_json::from_str(&encoder.encode(&report).unwrap()).unwrap();
        let pretty: serde_json::Value =
            serde_json::from_str(&encoder.encode_pretty(&report).unwrap()).unwrap();
        assert_eq!(compact, pretty);
    }
}

//! Core types for the Stress Sense engine
//!
//! This module defines the data structures that flow through each stage of the
//! engine: captured events, frozen sessions, feature vectors, z-scores and the
//! final stress score.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Pointer movement sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MovementEvent {
    pub x: f64,
    pub y: f64,
    /// Epoch seconds
    #[serde(rename = "timestamp")]
    pub t: f64,
}

impl MovementEvent {
    pub fn new(x: f64, y: f64, t: f64) -> Self {
        Self { x, y, t }
    }

    /// Euclidean distance to another sample
    pub fn distance_to(&self, other: &MovementEvent) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}

/// Pointer click (recorded on press)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClickEvent {
    pub x: f64,
    pub y: f64,
    /// Epoch seconds
    #[serde(rename = "timestamp")]
    pub t: f64,
    /// Button label as reported by the host, e.g. "left"
    #[serde(default)]
    pub button: String,
}

/// Key transition for raw key records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyAction {
    Down,
    Up,
}

/// A single keystroke record.
///
/// Two producers exist: front-ends that forward raw down/up transitions, and
/// the background capture which pairs presses with releases itself. The JSON
/// shapes differ by the presence of `action`; decoding picks the variant once
/// so nothing downstream has to inspect fields. A record with an `action` is
/// always raw, and an unknown action is a decode error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged, from = "KeyRecord")]
pub enum KeyEvent {
    Raw {
        key: String,
        action: KeyAction,
        #[serde(rename = "timestamp")]
        t: f64,
    },
    Paired {
        key: String,
        /// Seconds the key was held; absent for producers that only report presses
        #[serde(default, skip_serializing_if = "Option::is_none")]
        hold_time: Option<f64>,
        /// Press instant, epoch seconds
        #[serde(rename = "timestamp")]
        t: f64,
    },
}

/// Wire form of either keystroke shape
#[derive(Deserialize)]
struct KeyRecord {
    key: String,
    #[serde(default)]
    action: Option<KeyAction>,
    #[serde(default)]
    hold_time: Option<f64>,
    timestamp: f64,
}

impl From<KeyRecord> for KeyEvent {
    fn from(record: KeyRecord) -> Self {
        match record.action {
            Some(action) => KeyEvent::Raw {
                key: record.key,
                action,
                t: record.timestamp,
            },
            None => KeyEvent::Paired {
                key: record.key,
                hold_time: record.hold_time,
                t: record.timestamp,
            },
        }
    }
}

impl KeyEvent {
    pub fn key(&self) -> &str {
        match self {
            KeyEvent::Raw { key, .. } | KeyEvent::Paired { key, .. } => key,
        }
    }

    pub fn timestamp(&self) -> f64 {
        match self {
            KeyEvent::Raw { t, .. } | KeyEvent::Paired { t, .. } => *t,
        }
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, KeyEvent::Raw { .. })
    }
}

/// Frozen snapshot of one capture window.
///
/// The three streams are kept in arrival order. A `Session` has no mutating
/// API: once built (by `EventCapture::stop` or by decoding a submission) it
/// is read-only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    movements: Vec<MovementEvent>,
    #[serde(default)]
    clicks: Vec<ClickEvent>,
    #[serde(default)]
    keystrokes: Vec<KeyEvent>,
}

impl Session {
    pub fn new(
        movements: Vec<MovementEvent>,
        clicks: Vec<ClickEvent>,
        keystrokes: Vec<KeyEvent>,
    ) -> Self {
        Self {
            movements,
            clicks,
            keystrokes,
        }
    }

    pub fn movements(&self) -> &[MovementEvent] {
        &self.movements
    }

    pub fn clicks(&self) -> &[ClickEvent] {
        &self.clicks
    }

    pub fn keystrokes(&self) -> &[KeyEvent] {
        &self.keystrokes
    }

    /// Movements plus keystrokes (clicks are not counted)
    pub fn data_points(&self) -> usize {
        self.movements.len() + self.keystrokes.len()
    }

    /// True when there is nothing a baseline could be computed from
    pub fn is_empty(&self) -> bool {
        self.movements.is_empty() && self.keystrokes.is_empty()
    }
}

/// Session payload as submitted by a front-end or calibration client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSubmission {
    pub movements: Vec<MovementEvent>,
    #[serde(default)]
    pub clicks: Vec<ClickEvent>,
    #[serde(default)]
    pub keystrokes: Vec<KeyEvent>,
    /// Whether the caller wants the qualitative assessment summary attached
    #[serde(default)]
    pub analyze_with_llm: bool,
}

impl SessionSubmission {
    /// Wrap a captured session for submission
    pub fn from_session(session: &Session, analyze_with_llm: bool) -> Self {
        Self {
            movements: session.movements().to_vec(),
            clicks: session.clicks().to_vec(),
            keystrokes: session.keystrokes().to_vec(),
            analyze_with_llm,
        }
    }

    /// Freeze the submitted streams into a session
    pub fn to_session(&self) -> Session {
        Session::new(
            self.movements.clone(),
            self.clicks.clone(),
            self.keystrokes.clone(),
        )
    }
}

/// Flat name → value record of extracted features.
///
/// Absent names read as 0.0 through [`FeatureVector::get`]; use
/// [`FeatureVector::value`] when presence matters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector(BTreeMap<String, f64>);

impl FeatureVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.0.insert(name.into(), value);
    }

    /// Value for `name`, 0.0 when absent
    pub fn get(&self, name: &str) -> f64 {
        self.0.get(name).copied().unwrap_or(0.0)
    }

    pub fn value(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Merge `other` into `self`, overwriting duplicate names
    pub fn merge(&mut self, other: FeatureVector) {
        self.0.extend(other.0);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl FromIterator<(String, f64)> for FeatureVector {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Flat `z_<feature>` → standardized deviation record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZScoreVector(BTreeMap<String, f64>);

impl ZScoreVector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Key under which the z-score of `feature` is stored
    pub fn key_for(feature: &str) -> String {
        format!("z_{}", feature)
    }

    pub fn insert(&mut self, feature: &str, z: f64) {
        self.0.insert(Self::key_for(feature), z);
    }

    /// Z-score for a feature name (without the `z_` prefix)
    pub fn for_feature(&self, feature: &str) -> Option<f64> {
        self.0.get(&Self::key_for(feature)).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Stress estimate in [0.0, 1.0]
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StressScore(f64);

impl StressScore {
    /// Neutral score used when nothing pushes the estimate either way
    pub const NEUTRAL: StressScore = StressScore(0.5);

    /// Clamp into [0, 1]; NaN collapses to neutral
    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            return Self::NEUTRAL;
        }
        Self(value.clamp(0.0, 1.0))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

/// Which fusion path produced a score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringPath {
    /// Logistic over weighted baseline z-scores
    Baseline,
    /// Threshold increments over raw features
    Heuristic,
}

/// Result of analysing one session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub session_id: String,
    pub computed_at: DateTime<Utc>,
    /// Movements plus keystrokes
    pub data_points: usize,
    pub features: FeatureVector,
    pub z_scores: ZScoreVector,
    pub stress_score: StressScore,
    pub scoring_path: ScoringPath,
    /// Where the raw submission was archived, if it was
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived_to: Option<String>,
    /// Feature/z-score summary for the qualitative assessment component
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assessment_summary: Option<String>,
}

impl AnalysisReport {
    pub fn baseline_present(&self) -> bool {
        self.scoring_path == ScoringPath::Baseline
    }
}

/// Result of a calibration run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationReport {
    pub calibrated_at: DateTime<Utc>,
    pub baseline: FeatureVector,
}

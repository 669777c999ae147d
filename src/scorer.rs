//! Stress score fusion
//!
//! Two paths, picked solely by whether a baseline exists:
//!
//! ```text
//! baseline:   S = 0.3 * z_mouse_acc_std + 0.4 * z_key_flight_std
//!               + 0.3 * z_mouse_path_efficiency + 0.2 * z_mouse_click_latency
//!             score = 1 / (1 + e^-S)
//!
//! heuristic:  0.5 + 0.2 [mouse_acc_std > 0.5] + 0.1 [mouse_vel_mean > 2.0]
//!                 + 0.2 [key_flight_std > 50] + 0.15 [key_error_rate > 0.05]
//! ```
//!
//! The weights and thresholds are uncalibrated heuristics and can be overridden.

use crate::features::names::*;
use crate::types::{FeatureVector, ScoringPath, StressScore, ZScoreVector};
use serde::{Deserialize, Serialize};

/// Weights for the baseline-relative path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    /// Pointer jitter
    pub acc_std: f64,
    /// Typing rhythm variability
    pub flight_std: f64,
    pub path_efficiency: f64,
    pub click_latency: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            acc_std: 0.3,
            flight_std: 0.4,
            path_efficiency: 0.3,
            click_latency: 0.2,
        }
    }
}

impl ScoringWeights {
    fn terms(&self) -> [(&'static str, f64); 4] {
        [
            (MOUSE_ACC_STD, self.acc_std),
            (KEY_FLIGHT_STD, self.flight_std),
            (MOUSE_PATH_EFFICIENCY, self.path_efficiency),
            (MOUSE_CLICK_LATENCY, self.click_latency),
        ]
    }
}

/// Thresholds and increments for the no-baseline path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicThresholds {
    pub start: f64,
    pub acc_std: f64,
    pub acc_std_increment: f64,
    pub vel_mean: f64,
    pub vel_mean_increment: f64,
    /// Millisecond-scale threshold on flight-time spread
    pub flight_std: f64,
    pub flight_std_increment: f64,
    pub error_rate: f64,
    pub error_rate_increment: f64,
}

impl Default for HeuristicThresholds {
    fn default() -> Self {
        Self {
            start: 0.5,
            acc_std: 0.5,
            acc_std_increment: 0.2,
            vel_mean: 2.0,
            vel_mean_increment: 0.1,
            flight_std: 50.0,
            flight_std_increment: 0.20,
            error_rate: 0.05,
            error_rate_increment: 0.15,
        }
    }
}

/// Stress scorer
#[derive(Debug, Clone, Default)]
pub struct StressScorer {
    weights: ScoringWeights,
    thresholds: HeuristicThresholds,
}

impl StressScorer {
    pub fn new(weights: ScoringWeights, thresholds: HeuristicThresholds) -> Self {
        Self {
            weights,
            thresholds,
        }
    }

    /// Score a session. `z_scores` is `Some` exactly when a baseline exists.
    pub fn score(
        &self,
        features: &FeatureVector,
        z_scores: Option<&ZScoreVector>,
    ) -> (StressScore, ScoringPath) {
        match z_scores {
            Some(z) => (self.score_from_zscores(z), ScoringPath::Baseline),
            None => (self.score_from_features(features), ScoringPath::Heuristic),
        }
    }

    /// Logistic over the weighted z-score sum; missing entries contribute 0
    pub fn score_from_zscores(&self, z_scores: &ZScoreVector) -> StressScore {
        let sum: f64 = self
            .weights
            .terms()
            .iter()
            .map(|(name, weight)| weight * z_scores.for_feature(name).unwrap_or(0.0))
            .sum();

        let score = logistic(sum);
        tracing::debug!(weighted_sum = sum, score, "baseline stress score");
        StressScore::new(score)
    }

    /// Threshold increments over raw features
    pub fn score_from_features(&self, features: &FeatureVector) -> StressScore {
        let t = &self.thresholds;
        let mut score = t.start;

        if features.get(MOUSE_ACC_STD) > t.acc_std {
            score += t.acc_std_increment;
        }
        if features.get(MOUSE_VEL_MEAN) > t.vel_mean {
            score += t.vel_mean_increment;
        }
        if features.get(KEY_FLIGHT_STD) > t.flight_std {
            score += t.flight_std_increment;
        }
        if features.get(KEY_ERROR_RATE) > t.error_rate {
            score += t.error_rate_increment;
        }

        tracing::debug!(score, "heuristic stress score");
        StressScore::new(score)
    }
}

fn logistic(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zscores(entries: &[(&str, f64)]) -> ZScoreVector {
        let mut z = ZScoreVector::new();
        for (name, value) in entries {
            z.insert(name, *value);
        }
        z
    }

    fn features(entries: &[(&str, f64)]) -> FeatureVector {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect()
    }

    #[test]
    fn test_zero_sum_is_neutral() {
        let scorer = StressScorer::default();
        assert_eq!(scorer.score_from_zscores(&ZScoreVector::new()).value(), 0.5);
    }

    #[test]
    fn test_weighted_sum() {
        let scorer = StressScorer::default();
        let z = zscores(&[
            (MOUSE_ACC_STD, 1.0),
            (KEY_FLIGHT_STD, 1.0),
            (MOUSE_PATH_EFFICIENCY, 1.0),
            (MOUSE_CLICK_LATENCY, 1.0),
            // Not weighted
            (MOUSE_VEL_MEAN, 50.0),
        ]);
        let expected = 1.0 / (1.0 + (-1.2f64).exp());
        assert!((scorer.score_from_zscores(&z).value() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_monotonic_in_zscores() {
        let scorer = StressScorer::default();
        let low = scorer.score_from_zscores(&zscores(&[(KEY_FLIGHT_STD, -2.0)]));
        let mid = scorer.score_from_zscores(&zscores(&[(KEY_FLIGHT_STD, 0.5)]));
        let high = scorer.score_from_zscores(&zscores(&[(KEY_FLIGHT_STD, 3.0)]));
        assert!(low < mid && mid < high);
    }

    #[test]
    fn test_heuristic_baseline_free() {
        let scorer = StressScorer::default();
        assert_eq!(scorer.score_from_features(&FeatureVector::new()).value(), 0.5);

        let calm = features(&[(MOUSE_ACC_STD, 0.1), (MOUSE_VEL_MEAN, 1.0)]);
        assert_eq!(scorer.score_from_features(&calm).value(), 0.5);

        let jittery = features(&[(MOUSE_ACC_STD, 0.9), (KEY_ERROR_RATE, 0.1)]);
        assert!((scorer.score_from_features(&jittery).value() - 0.85).abs() < 1e-12);
    }

    #[test]
    fn test_heuristic_clamps_to_one() {
        let scorer = StressScorer::default();
        let all = features(&[
            (MOUSE_ACC_STD, 10.0),
            (MOUSE_VEL_MEAN, 10.0),
            (KEY_FLIGHT_STD, 100.0),
            (KEY_ERROR_RATE, 0.5),
        ]);
        assert_eq!(scorer.score_from_features(&all).value(), 1.0);
    }

    #[test]
    fn test_path_choice_follows_baseline_presence() {
        let scorer = StressScorer::default();
        let f = features(&[(MOUSE_ACC_STD, 10.0)]);

        let (_, path) = scorer.score(&f, None);
        assert_eq!(path, ScoringPath::Heuristic);

        let z = ZScoreVector::new();
        let (score, path) = scorer.score(&f, Some(&z));
        assert_eq!(path, ScoringPath::Baseline);
        assert_eq!(score.value(), 0.5);
    }

    #[test]
    fn test_scores_bounded_for_extreme_inputs() {
        let scorer = StressScorer::default();
        for value in [-1e308, -50.0, -1.0, 0.0, 1.0, 50.0, 1e308] {
            let z = zscores(&[(MOUSE_ACC_STD, value), (KEY_FLIGHT_STD, value)]);
            let s = scorer.score_from_zscores(&z).value();
            assert!((0.0..=1.0).contains(&s), "z={} gave {}", value, s);

            let f = features(&[(MOUSE_ACC_STD, value), (KEY_ERROR_RATE, value)]);
            let s = scorer.score_from_features(&f).value();
            assert!((0.0..=1.0).contains(&s), "feature={} gave {}", value, s);
        }
    }

    #[test]
    fn test_overridden_weights() {
        let weights = ScoringWeights {
            acc_std: 0.0,
            flight_std: 1.0,
            path_efficiency: 0.0,
            click_latency: 0.0,
        };
        let scorer = StressScorer::new(weights, HeuristicThresholds::default());
        let z = zscores(&[(MOUSE_ACC_STD, 5.0)]);
        assert_eq!(scorer.score_from_zscores(&z).value(), 0.5);
    }
}

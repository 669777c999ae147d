//! Baseline-relative normalization
//!
//! Expresses a session's features as z-scores against the calibrated baseline.
//! A single calibration session yields one value per feature, so only the
//! features that come with their own spread (mean/std pairs) get a measured
//! denominator. The rest use an assumed spread of 30% of the baseline value.
//! That constant is a rough heuristic and has not been validated.

use crate::features::names::*;
use crate::types::{FeatureVector, ZScoreVector};

/// Features scored against their own recorded spread: (mean, std)
pub const PAIRED_FEATURES: [(&str, &str); 3] = [
    (MOUSE_VEL_MEAN, MOUSE_VEL_STD),
    (KEY_FLIGHT_MEAN, KEY_FLIGHT_STD),
    (KEY_DWELL_MEAN, KEY_DWELL_STD),
];

/// Scalar features scored against an assumed spread
pub const HEURISTIC_FEATURES: [&str; 4] = [
    MOUSE_PATH_EFFICIENCY,
    KEY_ERROR_RATE,
    KEY_BACKSPACE_COUNT,
    MOUSE_CLICK_LATENCY,
];

/// Assumed spread as a fraction of the baseline value
pub const HEURISTIC_SPREAD_FRACTION: f64 = 0.3;

/// Lower bound on the assumed spread
pub const HEURISTIC_SPREAD_FLOOR: f64 = 0.001;

/// Z-score normalizer
pub struct ZScoreNormalizer;

impl ZScoreNormalizer {
    /// Compute z-scores of `current` against `baseline`
    pub fn normalize(current: &FeatureVector, baseline: &FeatureVector) -> ZScoreVector {
        let mut z_scores = ZScoreVector::new();

        for (mean_name, std_name) in PAIRED_FEATURES {
            if let (Some(value), Some(mu), Some(sigma)) = (
                current.value(mean_name),
                baseline.value(mean_name),
                baseline.value(std_name),
            ) {
                z_scores.insert(mean_name, paired_z(value, mu, sigma));
            }
        }

        for name in HEURISTIC_FEATURES {
            if let (Some(value), Some(mu)) = (current.value(name), baseline.value(name)) {
                z_scores.insert(name, heuristic_z(value, mu));
            }
        }

        z_scores
    }
}

/// `(value - mu) / sigma`, 0.0 for a non-positive spread
fn paired_z(value: f64, mu: f64, sigma: f64) -> f64 {
    if sigma > 0.0 {
        finite_or_zero((value - mu) / sigma)
    } else {
        0.0
    }
}

fn heuristic_z(value: f64, mu: f64) -> f64 {
    let sigma = (mu * HEURISTIC_SPREAD_FRACTION).max(HEURISTIC_SPREAD_FLOOR);
    finite_or_zero((value - mu) / sigma)
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

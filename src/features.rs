//! Feature extraction
//!
//! Turns a frozen [`Session`] into a flat [`FeatureVector`] of pointer
//! kinematics and keystroke-rhythm statistics. Extraction is pure: the same
//! session always yields the same vector, and degenerate input produces empty
//! or default-valued features rather than errors.

use crate::types::{ClickEvent, FeatureVector, KeyAction, KeyEvent, MovementEvent, Session};
use std::collections::{BTreeMap, HashMap, VecDeque};

/// Feature names emitted by the extractor
pub mod names {
    pub const MOUSE_VEL_MEAN: &str = "mouse_vel_mean";
    pub const MOUSE_VEL_STD: &str = "mouse_vel_std";
    pub const MOUSE_VEL_MAX: &str = "mouse_vel_max";
    pub const MOUSE_ACC_MEAN: &str = "mouse_acc_mean";
    pub const MOUSE_ACC_STD: &str = "mouse_acc_std";
    pub const MOUSE_TOTAL_DIST: &str = "mouse_total_dist";
    pub const MOUSE_POINTS: &str = "mouse_points";
    pub const MOUSE_PATH_EFFICIENCY: &str = "mouse_path_efficiency";
    pub const MOUSE_CLICK_LATENCY: &str = "mouse_click_latency";
    pub const KEY_DWELL_MEAN: &str = "key_dwell_mean";
    pub const KEY_DWELL_STD: &str = "key_dwell_std";
    pub const KEY_FLIGHT_MEAN: &str = "key_flight_mean";
    pub const KEY_FLIGHT_STD: &str = "key_flight_std";
    pub const KEY_CPM: &str = "key_cpm";
    pub const KEY_ERROR_RATE: &str = "key_error_rate";
    pub const KEY_BACKSPACE_COUNT: &str = "key_backspace_count";

    /// Every name a fully populated vector carries
    pub const ALL: [&str; 16] = [
        MOUSE_VEL_MEAN,
        MOUSE_VEL_STD,
        MOUSE_VEL_MAX,
        MOUSE_ACC_MEAN,
        MOUSE_ACC_STD,
        MOUSE_TOTAL_DIST,
        MOUSE_POINTS,
        MOUSE_PATH_EFFICIENCY,
        MOUSE_CLICK_LATENCY,
        KEY_DWELL_MEAN,
        KEY_DWELL_STD,
        KEY_FLIGHT_MEAN,
        KEY_FLIGHT_STD,
        KEY_CPM,
        KEY_ERROR_RATE,
        KEY_BACKSPACE_COUNT,
    ];
}

use names::*;

/// Minimum movements for path efficiency
const MIN_EFFICIENCY_POINTS: usize = 4;

/// Straight-line displacement a window must exceed to count (filters micro-movements)
const MIN_STRAIGHT_DISTANCE: f64 = 5.0;

/// Click latencies at or above this are deliberation, not reaction (milliseconds)
const CLICK_LATENCY_CUTOFF_MS: f64 = 2000.0;

/// Keys counted as corrections
const ERROR_KEYS: [&str; 2] = ["Backspace", "Delete"];

/// Feature extractor for input sessions
pub struct FeatureExtractor;

impl FeatureExtractor {
    /// Extract the full feature vector for a session
    pub fn extract(session: &Session) -> FeatureVector {
        let movements = session.movements();

        let mut features = Self::mouse_features(movements);
        features.merge(Self::keystroke_features(session.keystrokes()));
        features.insert(MOUSE_PATH_EFFICIENCY, Self::path_efficiency(movements));
        features.insert(
            MOUSE_CLICK_LATENCY,
            Self::click_latency(movements, session.clicks()),
        );

        tracing::debug!(
            movements = movements.len(),
            clicks = session.clicks().len(),
            keystrokes = session.keystrokes().len(),
            features = features.len(),
            "extracted session features"
        );

        features
    }

    /// Velocity, acceleration and distance statistics.
    ///
    /// Returns an empty vector for fewer than two movements.
    pub fn mouse_features(movements: &[MovementEvent]) -> FeatureVector {
        if movements.len() < 2 {
            return FeatureVector::new();
        }

        let sorted = sorted_by_time(movements);

        let mut total_dist = 0.0;
        let mut velocities = Vec::with_capacity(sorted.len() - 1);
        let mut velocity_dts = Vec::with_capacity(sorted.len() - 1);

        for pair in sorted.windows(2) {
            let dt = pair[1].t - pair[0].t;
            let dist = pair[0].distance_to(&pair[1]);
            total_dist += dist;

            // Coincident samples carry no velocity information
            if dt > 0.0 {
                velocities.push(dist / dt);
                velocity_dts.push(dt);
            }
        }

        let accelerations: Vec<f64> = velocities
            .windows(2)
            .zip(velocity_dts.iter().skip(1))
            .map(|(v, dt)| (v[1] - v[0]) / dt)
            .collect();
        let abs_accelerations: Vec<f64> = accelerations.iter().map(|a| a.abs()).collect();

        let vel_max = velocities.iter().copied().fold(f64::NAN, f64::max);

        let mut features = FeatureVector::new();
        features.insert(MOUSE_VEL_MEAN, finite_or_zero(mean(&velocities)));
        features.insert(MOUSE_VEL_STD, finite_or_zero(sample_std(&velocities)));
        features.insert(MOUSE_VEL_MAX, finite_or_zero(vel_max));
        features.insert(MOUSE_ACC_MEAN, finite_or_zero(mean(&abs_accelerations)));
        features.insert(MOUSE_ACC_STD, finite_or_zero(sample_std(&accelerations)));
        features.insert(MOUSE_TOTAL_DIST, finite_or_zero(total_dist));
        features.insert(MOUSE_POINTS, sorted.len() as f64);
        features
    }

    /// Mean tortuosity over one-second windows.
    ///
    /// Each window's ratio is path length over start-to-end displacement, so
    /// 1.0 is a straight stroke and larger values are more circuitous.
    /// Defaults to 1.0 when fewer than four points exist or no window moves
    /// further than the micro-movement threshold.
    pub fn path_efficiency(movements: &[MovementEvent]) -> f64 {
        if movements.len() < MIN_EFFICIENCY_POINTS {
            return 1.0;
        }

        let mut windows: BTreeMap<i64, Vec<MovementEvent>> = BTreeMap::new();
        for movement in sorted_by_time(movements) {
            windows
                .entry(movement.t.floor() as i64)
                .or_default()
                .push(movement);
        }

        let ratios: Vec<f64> = windows
            .values()
            .filter(|points| points.len() >= 2)
            .filter_map(|points| {
                let actual: f64 = points
                    .windows(2)
                    .map(|pair| pair[0].distance_to(&pair[1]))
                    .sum();
                let straight = points[0].distance_to(&points[points.len() - 1]);
                (straight > MIN_STRAIGHT_DISTANCE).then(|| actual / straight)
            })
            .collect();

        if ratios.is_empty() {
            1.0
        } else {
            finite_or(mean(&ratios), 1.0)
        }
    }

    /// Mean delay (ms) between the last preceding movement and each click.
    ///
    /// Clicks with no earlier movement are skipped; latencies of two seconds
    /// or more are dropped as outliers.
    pub fn click_latency(movements: &[MovementEvent], clicks: &[ClickEvent]) -> f64 {
        if movements.is_empty() || clicks.is_empty() {
            return 0.0;
        }

        let mut move_times: Vec<f64> = movements.iter().map(|m| m.t).collect();
        move_times.sort_by(f64::total_cmp);

        let latencies: Vec<f64> = clicks
            .iter()
            .filter_map(|click| {
                let idx = move_times.partition_point(|&t| t <= click.t);
                (idx > 0).then(|| (click.t - move_times[idx - 1]) * 1000.0)
            })
            .filter(|latency| *latency < CLICK_LATENCY_CUTOFF_MS)
            .collect();

        if latencies.is_empty() {
            0.0
        } else {
            finite_or_zero(mean(&latencies))
        }
    }

    /// Dwell, flight, typing speed and correction statistics.
    ///
    /// Returns an empty vector when there are no keystrokes.
    pub fn keystroke_features(keystrokes: &[KeyEvent]) -> FeatureVector {
        let Some(first) = keystrokes.first() else {
            return FeatureVector::new();
        };

        let timing = if first.is_raw() {
            raw_timing(keystrokes)
        } else {
            paired_timing(keystrokes)
        };

        let flight_times: Vec<f64> = timing
            .press_times
            .windows(2)
            .map(|pair| pair[1] - pair[0])
            .collect();

        let backspace_count = keystrokes
            .iter()
            .filter(|k| ERROR_KEYS.contains(&k.key()))
            .count();
        let error_rate = backspace_count as f64 / keystrokes.len() as f64;

        let mut features = FeatureVector::new();
        features.insert(KEY_DWELL_MEAN, finite_or_zero(mean(&timing.dwell_times)));
        features.insert(
            KEY_DWELL_STD,
            finite_or_zero(population_std(&timing.dwell_times)),
        );
        features.insert(KEY_FLIGHT_MEAN, finite_or_zero(mean(&flight_times)));
        features.insert(KEY_FLIGHT_STD, finite_or_zero(population_std(&flight_times)));
        features.insert(KEY_CPM, chars_per_minute(&timing.press_times));
        features.insert(KEY_ERROR_RATE, error_rate);
        features.insert(KEY_BACKSPACE_COUNT, backspace_count as f64);
        features
    }
}

/// Sorted press instants and measured hold durations
struct KeyTiming {
    press_times: Vec<f64>,
    dwell_times: Vec<f64>,
}

/// Raw down/up stream: presses come from downs, dwell from FIFO-matched ups
fn raw_timing(keystrokes: &[KeyEvent]) -> KeyTiming {
    let mut press_times = Vec::new();
    let mut dwell_times = Vec::new();
    let mut pending: HashMap<&str, VecDeque<f64>> = HashMap::new();

    for event in keystrokes {
        if let KeyEvent::Raw { key, action, t } = event {
            match action {
                KeyAction::Down => {
                    press_times.push(*t);
                    pending.entry(key.as_str()).or_default().push_back(*t);
                }
                KeyAction::Up => {
                    if let Some(start) = pending.get_mut(key.as_str()).and_then(|q| q.pop_front()) {
                        dwell_times.push(t - start);
                    }
                }
            }
        }
    }

    press_times.sort_by(f64::total_cmp);
    KeyTiming {
        press_times,
        dwell_times,
    }
}

/// Pre-paired stream: every record is a press, dwell is carried verbatim
fn paired_timing(keystrokes: &[KeyEvent]) -> KeyTiming {
    let mut press_times: Vec<f64> = keystrokes.iter().map(KeyEvent::timestamp).collect();
    press_times.sort_by(f64::total_cmp);

    let dwell_times = keystrokes
        .iter()
        .filter_map(|k| match k {
            KeyEvent::Paired { hold_time, .. } => *hold_time,
            KeyEvent::Raw { .. } => None,
        })
        .collect();

    KeyTiming {
        press_times,
        dwell_times,
    }
}

/// `count / span * 60000` over sorted press instants
fn chars_per_minute(press_times: &[f64]) -> f64 {
    if press_times.len() < 2 {
        return 0.0;
    }
    let span = press_times[press_times.len() - 1] - press_times[0];
    if span <= 0.0 {
        return 0.0;
    }
    finite_or_zero(press_times.len() as f64 / span * 60000.0)
}

fn sorted_by_time(movements: &[MovementEvent]) -> Vec<MovementEvent> {
    let mut sorted = movements.to_vec();
    sorted.sort_by(|a, b| a.t.total_cmp(&b.t));
    sorted
}

/// Arithmetic mean; NaN for an empty series
fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Standard deviation with Bessel's correction; NaN below two values
fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    let variance =
        values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Population standard deviation; NaN for an empty series
fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

fn finite_or_zero(value: f64) -> f64 {
    finite_or(value, 0.0)
}

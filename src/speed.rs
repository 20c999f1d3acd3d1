//! Mapping from the user-facing speed setting to a per-character delay.
//!
//! Speed is linear: `1` is the slowest cadence (about 0.119s per character)
//! and `100` the fastest (0.01s). The result never drops below 1ms.

use std::time::Duration;

/// Slowest accepted speed setting.
pub const MIN_SPEED: i32 = 1;
/// Fastest accepted speed setting.
pub const MAX_SPEED: i32 = 100;
/// Speed used when nothing else is configured.
pub const DEFAULT_SPEED: i32 = 70;

const BASE_SECS: f64 = 0.12;
const RANGE_SECS: f64 = 0.11;
const FLOOR_SECS: f64 = 0.001;

/// Per-character delay in seconds for `speed`.
///
/// Out-of-range input does not panic; only the 1ms floor is applied.
pub fn interval_secs(speed: i32) -> f64 {
    (BASE_SECS - (f64::from(speed) / 100.0) * RANGE_SECS).max(FLOOR_SECS)
}

/// Per-character delay for `speed` as a [`Duration`].
pub fn interval(speed: i32) -> Duration {
    Duration::from_secs_f64(interval_secs(speed))
}

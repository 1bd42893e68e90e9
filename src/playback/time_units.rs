// SPDX-License-Identifier: MPL-2.0
//! Time unit conversion utilities for playback.
//!
//! Timecodes are `Duration`s everywhere inside the pipeline. These helpers
//! convert at the edges:
//! - container timestamps in stream time-base ticks
//! - codec timestamps in microseconds (`AV_TIME_BASE`)
//! - user input in (fractional) seconds
//!
//! # Constants
//!
//! - `MICROS_PER_SECOND`: 1,000,000

use std::time::Duration;

/// Microseconds per second.
pub const MICROS_PER_SECOND: i64 = 1_000_000;

/// Converts a timecode to microseconds, saturating at `i64::MAX`.
///
/// # Examples
///
/// ```
/// use syncplay::playback::time_units::duration_to_micros;
/// use std::time::Duration;
///
/// assert_eq!(duration_to_micros(Duration::from_millis(1_500)), 1_500_000);
/// ```
#[inline]
#[must_use]
pub fn duration_to_micros(timecode: Duration) -> i64 {
    i64::try_from(timecode.as_micros()).unwrap_or(i64::MAX)
}

/// Converts microseconds to a timecode. Negative values clamp to zero.
///
/// # Examples
///
/// ```
/// use syncplay::playback::time_units::micros_to_duration;
/// use std::time::Duration;
///
/// assert_eq!(micros_to_duration(500_000), Duration::from_millis(500));
/// assert_eq!(micros_to_duration(-20), Duration::ZERO);
/// ```
#[inline]
#[must_use]
pub fn micros_to_duration(micros: i64) -> Duration {
    u64::try_from(micros).map_or(Duration::ZERO, Duration::from_micros)
}

/// Converts a timestamp in `numerator/denominator` second ticks to a
/// timecode. Negative timestamps and invalid time bases clamp to zero.
#[must_use]
pub fn ticks_to_duration(ticks: i64, numerator: i32, denominator: i32) -> Duration {
    if ticks <= 0 || numerator <= 0 || denominator <= 0 {
        return Duration::ZERO;
    }
    let micros = i128::from(ticks) * i128::from(numerator) * i128::from(MICROS_PER_SECOND)
        / i128::from(denominator);
    u64::try_from(micros).map_or(Duration::MAX, Duration::from_micros)
}

/// Parses a user-supplied position in seconds (`"12"`, `"7.5"`).
///
/// Returns `None` for negative, non-finite or malformed input.
#[must_use]
pub fn parse_seconds(raw: &str) -> Option<Duration> {
    let secs: f64 = raw.trim().parse().ok()?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(secs).ok()
}

/// Formats a timecode as `m:ss.mmm` for logs and the status line.
#[must_use]
pub fn format_timecode(timecode: Duration) -> String {
    let millis = timecode.as_millis();
    let minutes = millis / 60_000;
    let seconds = (millis / 1_000) % 60;
    format!("{minutes}:{seconds:02}.{:03}", millis % 1_000)
}

// SPDX-License-Identifier: MPL-2.0
//! Centralized default values for all configuration constants.
//!
//! This module serves as the single source of truth for default values
//! used across the player. Constants are organized by category.
//!
//! # Categories
//!
//! - **Sync**: Staleness thresholds and drift correction
//! - **Queues**: Capacities of the bounded handoff queues between stages
//! - **Video**: Render rate limit
//! - **Audio**: Playback volume

// ==========================================================================
// Sync Defaults
// ==========================================================================

/// A video frame later than this (in ms) is dropped instead of shown.
pub const DEFAULT_VIDEO_STALE_PAST_MS: u64 = 1_000;

/// A sample batch later than this (in ms) is dropped instead of played.
pub const DEFAULT_AUDIO_STALE_PAST_MS: u64 = 1_000;

/// A unit scheduled further ahead than this (in ms) is treated as bogus.
pub const DEFAULT_STALE_FUTURE_MS: u64 = 10_000;

/// Minimum interval between two drift correction ticks (ms).
pub const DEFAULT_CORRECTION_INTERVAL_MS: u64 = 250;

/// Drift below this (ms) is tolerated without rebasing the follower clock.
pub const DEFAULT_CORRECTION_TOLERANCE_MS: u64 = 40;

/// Upper bound for any staleness threshold (ms).
pub const MAX_STALE_MS: u64 = 60_000;

/// Lower bound for the past thresholds (ms). Below one frame period nothing plays.
pub const MIN_STALE_PAST_MS: u64 = 50;

// ==========================================================================
// Queue Defaults
// ==========================================================================

/// Packets buffered between the reader, the demuxer and each decoder.
pub const DEFAULT_PACKET_CAPACITY: usize = 32;

/// Decoded units buffered between a decoder and its sync engine.
pub const DEFAULT_DECODED_CAPACITY: usize = 4;

/// Frames buffered between the video engine and the presenter.
pub const DEFAULT_VIDEO_HANDOFF: usize = 2;

/// Batches buffered between the audio engine and the device callback.
pub const DEFAULT_AUDIO_HANDOFF: usize = 1;

/// Largest capacity accepted for any queue.
pub const MAX_QUEUE_CAPACITY: usize = 1_024;

// ==========================================================================
// Video Defaults
// ==========================================================================

/// Rendering rate limit. Set this to 60 for 720p60 material.
pub const DEFAULT_MAX_FPS: u32 = 30;

/// Minimum render rate.
pub const MIN_FPS: u32 = 1;

/// Maximum render rate.
pub const MAX_FPS: u32 = 240;

// ==========================================================================
// Volume Defaults
// ==========================================================================

/// Default playback volume (1.0 = 100%).
pub const DEFAULT_VOLUME: f32 = 0.8;

/// Minimum volume level.
pub const MIN_VOLUME: f32 = 0.0;

/// Maximum volume level (150%, amplification).
pub const MAX_VOLUME: f32 = 1.5;

/// Volume change per `+`/`-` command (5%).
pub const VOLUME_STEP: f32 = 0.05;

// ==========================================================================
// Compile-time Validation
// ==========================================================================

const _: () = {
    // Sync validation
    assert!(DEFAULT_VIDEO_STALE_PAST_MS >= MIN_STALE_PAST_MS);
    assert!(DEFAULT_AUDIO_STALE_PAST_MS >= MIN_STALE_PAST_MS);
    assert!(DEFAULT_STALE_FUTURE_MS > DEFAULT_VIDEO_STALE_PAST_MS);
    assert!(DEFAULT_STALE_FUTURE_MS <= MAX_STALE_MS);
    assert!(DEFAULT_CORRECTION_TOLERANCE_MS < DEFAULT_VIDEO_STALE_PAST_MS);

    // Queue validation
    assert!(DEFAULT_PACKET_CAPACITY > 0);
    assert!(DEFAULT_DECODED_CAPACITY > 0);
    assert!(DEFAULT_VIDEO_HANDOFF > 0);
    assert!(DEFAULT_AUDIO_HANDOFF > 0);
    assert!(DEFAULT_PACKET_CAPACITY <= MAX_QUEUE_CAPACITY);

    // Video validation
    assert!(DEFAULT_MAX_FPS >= MIN_FPS);
    assert!(DEFAULT_MAX_FPS <= MAX_FPS);

    // Volume validation
    assert!(DEFAULT_VOLUME >= MIN_VOLUME);
    assert!(DEFAULT_VOLUME <= MAX_VOLUME);
    assert!(VOLUME_STEP > 0.0);
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_defaults_are_valid() {
        assert_eq!(DEFAULT_VIDEO_STALE_PAST_MS, 1_000);
        assert_eq!(DEFAULT_STALE_FUTURE_MS, 10_000);
        assert!(DEFAULT_AUDIO_STALE_PAST_MS >= MIN_STALE_PAST_MS);
    }

    #[test]
    fn audio_handoff_is_single_slot() {
        assert_eq!(DEFAULT_AUDIO_HANDOFF, 1);
    }

    #[test]
    fn fps_defaults_are_valid() {
        assert_eq!(DEFAULT_MAX_FPS, 30);
        assert!(DEFAULT_MAX_FPS >= MIN_FPS);
        assert!(DEFAULT_MAX_FPS <= MAX_FPS);
    }

    #[test]
    fn volume_defaults_are_valid() {
        assert_eq!(DEFAULT_VOLUME, 0.8);
        assert!(DEFAULT_VOLUME >= MIN_VOLUME);
        assert!(DEFAULT_VOLUME <= MAX_VOLUME);
    }
}

// SPDX-License-Identifier: MPL-2.0
//! This module handles the player's configuration, loaded from a
//! `settings.toml` file.
//!
//! # Configuration Sections
//!
//! - `[sync]` - Clock master, staleness thresholds, drift correction
//! - `[queues]` - Capacities of the bounded queues between stages
//! - `[video]` - Render rate limit
//! - `[audio]` - Playback volume
//!
//! # Path Resolution
//!
//! 1. Use `load_from_path()`/`save_to_path()` with explicit path
//! 2. Set `SYNCPLAY_CONFIG_DIR` environment variable
//! 3. Falls back to platform-specific config directory
//!
//! # Examples
//!
//! ```no_run
//! use syncplay::config::{self, ClockMaster};
//!
//! let (mut config, _warning) = config::load();
//! config.sync.clock_master = Some(ClockMaster::Video);
//! config::save(&config).expect("Failed to save config");
//! ```

pub mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE: &str = "settings.toml";
const APP_NAME: &str = "SyncPlay";
const ENV_CONFIG_DIR: &str = "SYNCPLAY_CONFIG_DIR";

// =============================================================================
// Enums
// =============================================================================

/// Which stream's reported position the other stream follows.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ClockMaster {
    /// Video is slaved to the audio device's playback position.
    #[default]
    Audio,
    /// Audio follows the timecode of presented video frames.
    Video,
    /// Both streams free-run on their own epochs.
    Independent,
}

impl std::str::FromStr for ClockMaster {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.to_lowercase().as_str() {
            "audio" => Ok(ClockMaster::Audio),
            "video" => Ok(ClockMaster::Video),
            "independent" | "none" => Ok(ClockMaster::Independent),
            other => Err(Error::Config(format!("invalid clock master: {other}"))),
        }
    }
}

// =============================================================================
// Section Structs
// =============================================================================

/// Synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clock_master: Option<ClockMaster>,

    /// Maximum lateness of a video frame before it is dropped (ms).
    #[serde(
        default = "default_video_stale_past_ms",
        skip_serializing_if = "Option::is_none"
    )]
    pub video_stale_past_ms: Option<u64>,

    /// Maximum lateness of a sample batch before it is dropped (ms).
    #[serde(
        default = "default_audio_stale_past_ms",
        skip_serializing_if = "Option::is_none"
    )]
    pub audio_stale_past_ms: Option<u64>,

    /// Maximum scheduling lead before a unit is treated as bogus (ms).
    #[serde(
        default = "default_stale_future_ms",
        skip_serializing_if = "Option::is_none"
    )]
    pub stale_future_ms: Option<u64>,

    #[serde(
        default = "default_correction_interval_ms",
        skip_serializing_if = "Option::is_none"
    )]
    pub correction_interval_ms: Option<u64>,

    #[serde(
        default = "default_correction_tolerance_ms",
        skip_serializing_if = "Option::is_none"
    )]
    pub correction_tolerance_ms: Option<u64>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            clock_master: Some(ClockMaster::default()),
            video_stale_past_ms: default_video_stale_past_ms(),
            audio_stale_past_ms: default_audio_stale_past_ms(),
            stale_future_ms: default_stale_future_ms(),
            correction_interval_ms: default_correction_interval_ms(),
            correction_tolerance_ms: default_correction_tolerance_ms(),
        }
    }
}

impl SyncConfig {
    #[must_use]
    pub fn clock_master(&self) -> ClockMaster {
        self.clock_master.unwrap_or_default()
    }

    #[must_use]
    pub fn video_stale_past(&self) -> Duration {
        stale_ms(self.video_stale_past_ms, DEFAULT_VIDEO_STALE_PAST_MS)
    }

    #[must_use]
    pub fn audio_stale_past(&self) -> Duration {
        stale_ms(self.audio_stale_past_ms, DEFAULT_AUDIO_STALE_PAST_MS)
    }

    #[must_use]
    pub fn stale_future(&self) -> Duration {
        stale_ms(self.stale_future_ms, DEFAULT_STALE_FUTURE_MS)
    }

    #[must_use]
    pub fn correction_interval(&self) -> Duration {
        Duration::from_millis(
            self.correction_interval_ms
                .unwrap_or(DEFAULT_CORRECTION_INTERVAL_MS)
                .min(MAX_STALE_MS),
        )
    }

    #[must_use]
    pub fn correction_tolerance(&self) -> Duration {
        Duration::from_millis(
            self.correction_tolerance_ms
                .unwrap_or(DEFAULT_CORRECTION_TOLERANCE_MS)
                .min(MAX_STALE_MS),
        )
    }
}

fn stale_ms(value: Option<u64>, default: u64) -> Duration {
    Duration::from_millis(value.unwrap_or(default).clamp(MIN_STALE_PAST_MS, MAX_STALE_MS))
}

/// Queue capacities between pipeline stages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueConfig {
    #[serde(
        default = "default_packet_capacity",
        skip_serializing_if = "Option::is_none"
    )]
    pub packet_capacity: Option<usize>,

    #[serde(
        default = "default_decoded_capacity",
        skip_serializing_if = "Option::is_none"
    )]
    pub decoded_capacity: Option<usize>,

    #[serde(
        default = "default_video_handoff",
        skip_serializing_if = "Option::is_none"
    )]
    pub video_handoff: Option<usize>,

    #[serde(
        default = "default_audio_handoff",
        skip_serializing_if = "Option::is_none"
    )]
    pub audio_handoff: Option<usize>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            packet_capacity: default_packet_capacity(),
            decoded_capacity: default_decoded_capacity(),
            video_handoff: default_video_handoff(),
            audio_handoff: default_audio_handoff(),
        }
    }
}

impl QueueConfig {
    #[must_use]
    pub fn packet_capacity(&self) -> usize {
        capacity(self.packet_capacity, DEFAULT_PACKET_CAPACITY)
    }

    #[must_use]
    pub fn decoded_capacity(&self) -> usize {
        capacity(self.decoded_capacity, DEFAULT_DECODED_CAPACITY)
    }

    #[must_use]
    pub fn video_handoff(&self) -> usize {
        capacity(self.video_handoff, DEFAULT_VIDEO_HANDOFF)
    }

    #[must_use]
    pub fn audio_handoff(&self) -> usize {
        capacity(self.audio_handoff, DEFAULT_AUDIO_HANDOFF)
    }
}

// tokio channels panic on a zero capacity
fn capacity(value: Option<usize>, default: usize) -> usize {
    value.unwrap_or(default).clamp(1, MAX_QUEUE_CAPACITY)
}

/// Video presentation settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoConfig {
    /// Limits the rendering rate.
    #[serde(default = "default_max_fps", skip_serializing_if = "Option::is_none")]
    pub max_fps: Option<u32>,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            max_fps: default_max_fps(),
        }
    }
}

impl VideoConfig {
    /// Minimum interval between two rendered frames.
    #[must_use]
    pub fn frame_interval(&self) -> Duration {
        let fps = self.max_fps.unwrap_or(DEFAULT_MAX_FPS).clamp(MIN_FPS, MAX_FPS);
        Duration::from_secs(1) / fps
    }
}

/// Audio playback settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AudioConfig {
    /// Playback volume (0.0 to 1.5).
    #[serde(default = "default_volume", skip_serializing_if = "Option::is_none")]
    pub volume: Option<f32>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            volume: default_volume(),
        }
    }
}

// =============================================================================
// Main Config Struct (Sectioned)
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub queues: QueueConfig,

    #[serde(default)]
    pub video: VideoConfig,

    #[serde(default)]
    pub audio: AudioConfig,
}

// =============================================================================
// Default Value Functions
// =============================================================================

fn default_video_stale_past_ms() -> Option<u64> {
    Some(DEFAULT_VIDEO_STALE_PAST_MS)
}

fn default_audio_stale_past_ms() -> Option<u64> {
    Some(DEFAULT_AUDIO_STALE_PAST_MS)
}

fn default_stale_future_ms() -> Option<u64> {
    Some(DEFAULT_STALE_FUTURE_MS)
}

fn default_correction_interval_ms() -> Option<u64> {
    Some(DEFAULT_CORRECTION_INTERVAL_MS)
}

fn default_correction_tolerance_ms() -> Option<u64> {
    Some(DEFAULT_CORRECTION_TOLERANCE_MS)
}

fn default_packet_capacity() -> Option<usize> {
    Some(DEFAULT_PACKET_CAPACITY)
}

fn default_decoded_capacity() -> Option<usize> {
    Some(DEFAULT_DECODED_CAPACITY)
}

fn default_video_handoff() -> Option<usize> {
    Some(DEFAULT_VIDEO_HANDOFF)
}

fn default_audio_handoff() -> Option<usize> {
    Some(DEFAULT_AUDIO_HANDOFF)
}

fn default_max_fps() -> Option<u32> {
    Some(DEFAULT_MAX_FPS)
}

fn default_volume() -> Option<f32> {
    Some(DEFAULT_VOLUME)
}

// =============================================================================
// Config Path Resolution
// =============================================================================

/// Returns the config directory, honoring an explicit override first, then
/// `SYNCPLAY_CONFIG_DIR`, then the platform config directory.
fn get_config_dir_with_override(override_path: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(path) = override_path {
        return Some(path);
    }

    if let Ok(env_path) = std::env::var(ENV_CONFIG_DIR) {
        if !env_path.is_empty() {
            return Some(PathBuf::from(env_path));
        }
    }

    dirs::config_dir().map(|mut path| {
        path.push(APP_NAME);
        path
    })
}

fn get_config_path_with_override(base_dir: Option<PathBuf>) -> Option<PathBuf> {
    get_config_dir_with_override(base_dir).map(|mut path| {
        path.push(CONFIG_FILE);
        path
    })
}

// =============================================================================
// Load / Save
// =============================================================================

/// Loads the configuration from the default path.
///
/// Returns a tuple of (config, optional_warning). If loading fails, returns
/// default config with a warning explaining what went wrong.
pub fn load() -> (Config, Option<String>) {
    load_with_override(None)
}

/// Loads the configuration from a custom directory.
pub fn load_with_override(base_dir: Option<PathBuf>) -> (Config, Option<String>) {
    if let Some(path) = get_config_path_with_override(base_dir) {
        if path.exists() {
            match load_from_path(&path) {
                Ok(config) => return (config, None),
                Err(err) => {
                    return (
                        Config::default(),
                        Some(format!("ignoring {}: {err}", path.display())),
                    );
                }
            }
        }
    }
    (Config::default(), None)
}

/// Loads configuration from a specific path.
pub fn load_from_path(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    Ok(config)
}

/// Saves the configuration to the default path.
pub fn save(config: &Config) -> Result<()> {
    save_with_override(config, None)
}

/// Saves the configuration to a custom directory.
pub fn save_with_override(config: &Config, base_dir: Option<PathBuf>) -> Result<()> {
    if let Some(path) = get_config_path_with_override(base_dir) {
        return save_to_path(config, &path);
    }
    Ok(())
}

/// Saves configuration to a specific path, creating parent directories.
pub fn save_to_path(config: &Config, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)?;
    fs::write(path, content)?;
    Ok(())
}

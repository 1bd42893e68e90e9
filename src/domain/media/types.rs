// SPDX-License-Identifier: MPL-2.0
//! Core media types for the domain layer.
//!
//! These types represent pure data without any codec or device dependencies.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Identifier of an elementary stream inside one container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackId(pub usize);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Kind of an elementary stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Video,
    Audio,
}

impl TrackKind {
    /// Short label used in log fields.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            TrackKind::Video => "video",
            TrackKind::Audio => "audio",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoParams {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioParams {
    pub channels: u16,
    pub sample_rate: u32,
}

/// Description of one track, read-only after the container is opened.
///
/// `video`/`audio` parameters are `None` when the codec could not be probed;
/// the track is still routed and its decoder runs in drop mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackMeta {
    pub id: TrackId,
    pub kind: TrackKind,
    pub codec_id: String,
    pub video: Option<VideoParams>,
    pub audio: Option<AudioParams>,
}

impl TrackMeta {
    #[must_use]
    pub fn video(id: TrackId, codec_id: impl Into<String>, params: Option<VideoParams>) -> Self {
        Self {
            id,
            kind: TrackKind::Video,
            codec_id: codec_id.into(),
            video: params,
            audio: None,
        }
    }

    #[must_use]
    pub fn audio(id: TrackId, codec_id: impl Into<String>, params: Option<AudioParams>) -> Self {
        Self {
            id,
            kind: TrackKind::Audio,
            codec_id: codec_id.into(),
            video: None,
            audio: params,
        }
    }

    #[must_use]
    pub fn is_video(&self) -> bool {
        self.kind == TrackKind::Video
    }

    #[must_use]
    pub fn is_audio(&self) -> bool {
        self.kind == TrackKind::Audio
    }
}

/// One compressed, timestamped unit of a track.
///
/// Packets are moved, never shared: reader, then demuxer, then exactly one
/// decoder queue. `generation` counts the seeks applied by the reader before
/// this packet was read, so downstream stages can tell pre-seek data apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub track: TrackId,
    pub timecode: Duration,
    pub payload: Vec<u8>,
    pub is_keyframe: bool,
    pub generation: u64,
}

impl Packet {
    #[must_use]
    pub fn new(track: TrackId, timecode: Duration, payload: Vec<u8>) -> Self {
        Self {
            track,
            timecode,
            payload,
            is_keyframe: false,
            generation: 0,
        }
    }

    /// Marks the packet as a keyframe.
    #[must_use]
    pub fn keyframe(mut self) -> Self {
        self.is_keyframe = true;
        self
    }
}

/// Anything carrying a presentation timecode.
pub trait Timed {
    fn timecode(&self) -> Duration;
}

/// A decoded video frame in RGBA.
///
/// # Example
///
/// ```
/// use syncplay::domain::media::{Timed, VideoFrame};
/// use std::time::Duration;
///
/// let frame = VideoFrame::new(2, 2, vec![0u8; 16], Duration::from_millis(40));
/// assert_eq!(frame.timecode(), Duration::from_millis(40));
/// assert_eq!(frame.size_bytes(), 16);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    /// RGBA pixel data (width × height × 4 bytes).
    pub pixels: Arc<Vec<u8>>,
    pub width: u32,
    pub height: u32,
    pub timecode: Duration,
    pub is_keyframe: bool,
}

impl VideoFrame {
    #[must_use]
    pub fn new(width: u32, height: u32, pixels: Vec<u8>, timecode: Duration) -> Self {
        Self {
            pixels: Arc::new(pixels),
            width,
            height,
            timecode,
            is_keyframe: false,
        }
    }

    /// Returns the total size in bytes.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.pixels.len()
    }
}

impl Timed for VideoFrame {
    fn timecode(&self) -> Duration {
        self.timecode
    }
}

/// Interleaved f32 samples normalized to [-1.0, 1.0], already converted to
/// the output device's rate and channel count.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBatch {
    pub pcm: Arc<Vec<f32>>,
    pub channels: u16,
    pub sample_rate: u32,
    pub timecode: Duration,
}

impl SampleBatch {
    #[must_use]
    pub fn new(pcm: Vec<f32>, channels: u16, sample_rate: u32, timecode: Duration) -> Self {
        Self {
            pcm: Arc::new(pcm),
            channels,
            sample_rate,
            timecode,
        }
    }

    /// Returns the number of frames (samples per channel).
    #[must_use]
    pub fn frame_count(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.pcm.len() / usize::from(self.channels)
    }

    /// Playback duration of the batch.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.offset_duration(self.pcm.len())
    }

    /// Playback offset of the interleaved sample at `sample_index`.
    #[must_use]
    pub fn offset_duration(&self, sample_index: usize) -> Duration {
        if self.channels == 0 || self.sample_rate == 0 {
            return Duration::ZERO;
        }
        let frames = (sample_index / usize::from(self.channels)) as u64;
        Duration::from_micros(frames * 1_000_000 / u64::from(self.sample_rate))
    }
}

impl Timed for SampleBatch {
    fn timecode(&self) -> Duration {
        self.timecode
    }
}

/// Sample rate and channel count the audio device plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioOutputConfig {
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for AudioOutputConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            channels: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_batch_reports_frames_and_duration() {
        // 100ms at 48kHz stereo
        let batch = SampleBatch::new(vec![0.0; 9_600], 2, 48_000, Duration::ZERO);
        assert_eq!(batch.frame_count(), 4_800);
        assert_eq!(batch.duration(), Duration::from_millis(100));
        assert_eq!(batch.offset_duration(4_800), Duration::from_millis(50));
    }

    #[test]
    fn sample_batch_with_zero_channels_is_empty() {
        let batch = SampleBatch::new(vec![0.0; 16], 0, 48_000, Duration::ZERO);
        assert_eq!(batch.frame_count(), 0);
        assert_eq!(batch.duration(), Duration::ZERO);
    }

    #[test]
    fn packet_defaults_to_first_generation() {
        let packet = Packet::new(TrackId(1), Duration::from_millis(33), vec![1, 2, 3]).keyframe();
        assert!(packet.is_keyframe);
        assert_eq!(packet.generation, 0);
    }

    #[test]
    fn track_meta_constructors_set_kind() {
        let video = TrackMeta::video(
            TrackId(0),
            "vp9",
            Some(VideoParams {
                width: 1280,
                height: 720,
            }),
        );
        let audio = TrackMeta::audio(TrackId(1), "opus", None);
        assert!(video.is_video());
        assert!(audio.is_audio());
        assert_eq!(audio.kind.label(), "audio");
        assert_eq!(TrackId(3).to_string(), "#3");
    }
}

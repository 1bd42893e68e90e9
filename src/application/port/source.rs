// SPDX-License-Identifier: MPL-2.0
//! Packet source port definition.
//!
//! This module defines the [`PacketSource`] trait that wraps an external
//! container demuxer. Infrastructure adapters (like `FFmpeg`) implement it.
//!
//! # Design Notes
//!
//! - The source is **stateful** and single pass: each packet is read once
//! - `seek` repositions the underlying reader; packets read afterwards start
//!   at or before the target (typically the preceding keyframe)
//! - Read errors are reported per call; the caller decides whether to go on

use crate::application::port::codec::CodecFactory;
use crate::domain::media::{Packet, TrackMeta};
use crate::error::Result;
use std::time::Duration;

// =============================================================================
// PacketSource Trait
// =============================================================================

/// Port for reading timestamped packets out of a container.
///
/// # Lifecycle
///
/// 1. Open the container with an adapter (e.g. `FfmpegSource::open`)
/// 2. Inspect `tracks()` to select the streams to play
/// 3. Call `read_packet()` until it returns `Ok(None)`
/// 4. Use `seek()` to restart emission from another timecode
///
/// # Example
///
/// ```ignore
/// use syncplay::application::port::PacketSource;
///
/// fn count_packets(source: &mut dyn PacketSource) -> usize {
///     let mut count = 0;
///     while let Ok(Some(_packet)) = source.read_packet() {
///         count += 1;
///     }
///     count
/// }
/// ```
pub trait PacketSource: Send {
    /// Tracks discovered when the container was opened.
    fn tracks(&self) -> &[TrackMeta];

    /// Total duration advertised by the container, if any.
    fn duration(&self) -> Option<Duration>;

    /// Reads the next packet in container order.
    ///
    /// Returns `Ok(None)` once the input is exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Source`](crate::error::Error::Source) if the
    /// container data cannot be read.
    fn read_packet(&mut self) -> Result<Option<Packet>>;

    /// Repositions the source so emission resumes from `target`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Source`](crate::error::Error::Source) if the
    /// underlying reader cannot seek.
    fn seek(&mut self, target: Duration) -> Result<()>;
}

/// An opened input: its packet source plus a factory for the codecs of its
/// tracks.
pub struct OpenedInput {
    pub source: Box<dyn PacketSource>,
    pub codecs: Box<dyn CodecFactory>,
}

impl OpenedInput {
    #[must_use]
    pub fn new(source: Box<dyn PacketSource>, codecs: Box<dyn CodecFactory>) -> Self {
        Self { source, codecs }
    }
}

impl std::fmt::Debug for OpenedInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenedInput")
            .field("tracks", &self.source.tracks())
            .field("duration", &self.source.duration())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::media::{TrackId, TrackMeta};

    // Test that the trait is object-safe
    fn _assert_object_safe(_: &dyn PacketSource) {}

    struct MockSource {
        tracks: Vec<TrackMeta>,
        packets: Vec<Packet>,
        cursor: usize,
    }

    impl MockSource {
        fn new(count: u64) -> Self {
            Self {
                tracks: vec![TrackMeta::video(TrackId(0), "mock", None)],
                packets: (0..count)
                    .map(|i| Packet::new(TrackId(0), Duration::from_millis(i * 40), vec![]))
                    .collect(),
                cursor: 0,
            }
        }
    }

    impl PacketSource for MockSource {
        fn tracks(&self) -> &[TrackMeta] {
            &self.tracks
        }

        fn duration(&self) -> Option<Duration> {
            self.packets.last().map(|p| p.timecode)
        }

        fn read_packet(&mut self) -> Result<Option<Packet>> {
            let packet = self.packets.get(self.cursor).cloned();
            self.cursor += 1;
            Ok(packet)
        }

        fn seek(&mut self, target: Duration) -> Result<()> {
            self.cursor = self
                .packets
                .iter()
                .position(|p| p.timecode >= target)
                .unwrap_or(self.packets.len());
            Ok(())
        }
    }

    #[test]
    fn mock_source_reads_until_exhausted() {
        let mut source = MockSource::new(3);
        let mut timecodes = Vec::new();
        while let Some(packet) = source.read_packet().unwrap() {
            timecodes.push(packet.timecode);
        }
        assert_eq!(timecodes.len(), 3);
        assert!(source.read_packet().unwrap().is_none());
    }

    #[test]
    fn mock_source_seek_restarts_emission() {
        let mut source = MockSource::new(10);
        source.seek(Duration::from_millis(200)).unwrap();
        let packet = source.read_packet().unwrap().unwrap();
        assert_eq!(packet.timecode, Duration::from_millis(200));
        assert_eq!(source.duration(), Some(Duration::from_millis(360)));
    }
}

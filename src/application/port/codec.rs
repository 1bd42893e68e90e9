// SPDX-License-Identifier: MPL-2.0
//! Codec port definition.
//!
//! A [`Codec`] turns the packets of one track into decoded units. The same
//! trait serves video (`Unit = VideoFrame`) and audio (`Unit = SampleBatch`),
//! so the decode stage is written once.

use crate::domain::media::{AudioOutputConfig, Packet, SampleBatch, Timed, TrackMeta, VideoFrame};
use crate::error::Result;

/// Port for decoding the packets of a single track.
///
/// Implementations must emit units in presentation order and tag each one
/// with its timecode. A packet may yield zero, one or several units.
pub trait Codec: Send {
    type Unit: Timed + Send + 'static;

    /// Decodes one packet.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`](crate::error::Error::Decode) when the packet
    /// is corrupt; the caller skips it and continues with the next one.
    fn decode(&mut self, packet: &Packet) -> Result<Vec<Self::Unit>>;

    /// Drains the units still buffered inside the codec at end of input.
    fn flush(&mut self) -> Vec<Self::Unit>;

    /// Discards everything buffered inside the codec. Called when the input
    /// jumps to another position, before the first packet after the jump.
    fn reset(&mut self);
}

/// Builds codecs for the tracks of one opened input.
pub trait CodecFactory: Send {
    /// Creates a decoder producing RGBA frames.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CodecInit`](crate::error::Error::CodecInit) when the
    /// codec is not supported.
    fn video_codec(&self, track: &TrackMeta) -> Result<Box<dyn Codec<Unit = VideoFrame>>>;

    /// Creates a decoder producing samples already converted to `output`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CodecInit`](crate::error::Error::CodecInit) when the
    /// codec or the conversion to the device format is not supported.
    fn audio_codec(
        &self,
        track: &TrackMeta,
        output: AudioOutputConfig,
    ) -> Result<Box<dyn Codec<Unit = SampleBatch>>>;
}

// SPDX-License-Identifier: MPL-2.0
//! Video codec: `FFmpeg` decoder followed by RGBA conversion.

use super::{codec_init_error, decode_error, OwnedParameters};
use crate::application::port::Codec;
use crate::domain::media::{Packet, VideoFrame};
use crate::error::Result;
use crate::playback::time_units::{duration_to_micros, micros_to_duration};
use ffmpeg_next::format::Pixel;
use ffmpeg_next::software::scaling;
use std::time::Duration;

/// Source format the current scaler was built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ScalerKey {
    format: Pixel,
    width: u32,
    height: u32,
}

pub struct FfmpegVideoCodec {
    decoder: ffmpeg_next::decoder::Video,
    scaler: Option<(ScalerKey, scaling::Context)>,
    codec: String,
}

// SAFETY: FfmpegVideoCodec holds FFmpeg decoder and scaler contexts with
// internal raw pointers. They are owned exclusively by this value and only
// used through `&mut self` from the decoding thread it was moved to.
unsafe impl Send for FfmpegVideoCodec {}

impl FfmpegVideoCodec {
    /// Creates a decoder for the given stream parameters.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CodecInit`](crate::error::Error::CodecInit) when no
    /// decoder exists for the codec.
    pub fn new(parameters: OwnedParameters, codec: &str) -> Result<Self> {
        let decoder = ffmpeg_next::codec::context::Context::from_parameters(parameters.0)
            .map_err(|e| codec_init_error(codec, e))?
            .decoder()
            .video()
            .map_err(|e| codec_init_error(codec, e))?;
        Ok(Self {
            decoder,
            scaler: None,
            codec: codec.to_string(),
        })
    }

    /// Pulls every frame the decoder has ready.
    fn receive(&mut self) -> Vec<VideoFrame> {
        let mut frames = Vec::new();
        let mut decoded = ffmpeg_next::frame::Video::empty();
        while self.decoder.receive_frame(&mut decoded).is_ok() {
            match self.convert(&decoded) {
                Ok(frame) => frames.push(frame),
                Err(err) => {
                    tracing::warn!(codec = %self.codec, error = %err, "frame conversion failed");
                }
            }
        }
        frames
    }

    fn convert(&mut self, decoded: &ffmpeg_next::frame::Video) -> Result<VideoFrame> {
        let key = ScalerKey {
            format: decoded.format(),
            width: decoded.width(),
            height: decoded.height(),
        };
        let mut scaler = match self.scaler.take() {
            Some((current, scaler)) if current == key => scaler,
            _ => scaling::Context::get(
                key.format,
                key.width,
                key.height,
                Pixel::RGBA,
                key.width,
                key.height,
                scaling::Flags::BILINEAR,
            )
            .map_err(|e| decode_error(&self.codec, format!("failed to create scaler: {e}")))?,
        };

        let mut rgba = ffmpeg_next::frame::Video::empty();
        let scaled = scaler.run(decoded, &mut rgba);
        self.scaler = Some((key, scaler));
        scaled.map_err(|e| decode_error(&self.codec, format!("scaling failed: {e}")))?;

        let timecode = decoded
            .timestamp()
            .map_or(Duration::ZERO, micros_to_duration);
        let mut frame = VideoFrame::new(key.width, key.height, extract_rgba_data(&rgba), timecode);
        frame.is_keyframe = decoded.is_key();
        Ok(frame)
    }
}

/// Copies the RGBA plane of `frame` row by row, dropping the stride padding.
#[allow(clippy::cast_possible_truncation)] // stride is always < u32::MAX for video frames
fn extract_rgba_data(frame: &ffmpeg_next::frame::Video) -> Vec<u8> {
    let width = frame.width();
    let height = frame.height();
    let data = frame.data(0);
    let stride = frame.stride(0);

    let mut rgba_bytes = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        let row_start = (y * stride as u32) as usize;
        let row_end = row_start + (width * 4) as usize;
        rgba_bytes.extend_from_slice(&data[row_start..row_end]);
    }

    rgba_bytes
}

impl Codec for FfmpegVideoCodec {
    type Unit = VideoFrame;

    fn decode(&mut self, packet: &Packet) -> Result<Vec<VideoFrame>> {
        // The pts is echoed on the decoded frame, in presentation order.
        let mut raw = ffmpeg_next::Packet::copy(&packet.payload);
        raw.set_pts(Some(duration_to_micros(packet.timecode)));
        if packet.is_keyframe {
            raw.set_flags(ffmpeg_next::packet::Flags::KEY);
        }
        self.decoder
            .send_packet(&raw)
            .map_err(|e| decode_error(&self.codec, e))?;
        Ok(self.receive())
    }

    fn flush(&mut self) -> Vec<VideoFrame> {
        if let Err(err) = self.decoder.send_eof() {
            tracing::debug!(codec = %self.codec, error = %err, "video decoder flush failed");
            return Vec::new();
        }
        self.receive()
    }

    fn reset(&mut self) {
        self.decoder.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send<T: Send>() {}

    #[test]
    fn codec_is_send() {
        assert_send::<FfmpegVideoCodec>();
    }

    #[test]
    fn rgba_rows_skip_stride_padding() {
        super::super::init_ffmpeg().unwrap();
        let frame = ffmpeg_next::frame::Video::new(Pixel::RGBA, 3, 2);
        let data = extract_rgba_data(&frame);
        assert_eq!(data.len(), 3 * 2 * 4);
    }
}

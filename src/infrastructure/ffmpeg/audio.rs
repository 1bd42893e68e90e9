// SPDX-License-Identifier: MPL-2.0
//! Audio codec: `FFmpeg` decoder followed by resampling to the device format.

use super::{codec_init_error, decode_error, OwnedParameters};
use crate::application::port::Codec;
use crate::domain::media::{AudioOutputConfig, Packet, SampleBatch};
use crate::error::Result;
use crate::playback::time_units::{duration_to_micros, micros_to_duration};
use ffmpeg_next::software::resampling;
use std::time::Duration;

pub struct FfmpegAudioCodec {
    decoder: ffmpeg_next::decoder::Audio,
    resampler: resampling::Context,
    output: AudioOutputConfig,
    codec: String,
}

// SAFETY: FfmpegAudioCodec holds FFmpeg decoder and resampler contexts with
// internal raw pointers. They are owned exclusively by this value and only
// used through `&mut self` from the decoding thread it was moved to.
unsafe impl Send for FfmpegAudioCodec {}

impl FfmpegAudioCodec {
    /// Creates a decoder producing interleaved f32 samples at the device's
    /// rate. Anything but mono is downmixed to stereo.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CodecInit`](crate::error::Error::CodecInit) when no
    /// decoder exists for the codec or the resampler cannot be built.
    pub fn new(parameters: OwnedParameters, codec: &str, output: AudioOutputConfig) -> Result<Self> {
        let decoder = ffmpeg_next::codec::context::Context::from_parameters(parameters.0)
            .map_err(|e| codec_init_error(codec, e))?
            .decoder()
            .audio()
            .map_err(|e| codec_init_error(codec, e))?;

        let output = AudioOutputConfig {
            sample_rate: output.sample_rate,
            channels: if output.channels == 1 { 1 } else { 2 },
        };
        let resampler = build_resampler(&decoder, output)
            .map_err(|e| codec_init_error(codec, format!("failed to create resampler: {e}")))?;

        Ok(Self {
            decoder,
            resampler,
            output,
            codec: codec.to_string(),
        })
    }

    /// Pulls every frame the decoder has ready and resamples it.
    fn receive(&mut self) -> Vec<SampleBatch> {
        let mut batches = Vec::new();
        let mut decoded = ffmpeg_next::frame::Audio::empty();
        while self.decoder.receive_frame(&mut decoded).is_ok() {
            let mut resampled = ffmpeg_next::frame::Audio::empty();
            if let Err(err) = self.resampler.run(&decoded, &mut resampled) {
                tracing::warn!(codec = %self.codec, error = %err, "resampling failed");
                continue;
            }
            let pcm = extract_samples(&resampled, self.output.channels);
            if pcm.is_empty() {
                continue;
            }
            let timecode = decoded
                .timestamp()
                .map_or(Duration::ZERO, micros_to_duration);
            batches.push(SampleBatch::new(
                pcm,
                self.output.channels,
                self.output.sample_rate,
                timecode,
            ));
        }
        batches
    }
}

/// Resampler from the decoder's native format to packed f32 at `output`.
fn build_resampler(
    decoder: &ffmpeg_next::decoder::Audio,
    output: AudioOutputConfig,
) -> std::result::Result<resampling::Context, ffmpeg_next::Error> {
    let layout = match output.channels {
        1 => ffmpeg_next::ChannelLayout::MONO,
        _ => ffmpeg_next::ChannelLayout::STEREO,
    };
    resampling::Context::get(
        decoder.format(),
        decoder.channel_layout(),
        decoder.rate(),
        ffmpeg_next::format::Sample::F32(ffmpeg_next::format::sample::Type::Packed),
        layout,
        output.sample_rate,
    )
}

/// Reads the packed f32 plane of a resampled frame.
fn extract_samples(frame: &ffmpeg_next::frame::Audio, channels: u16) -> Vec<f32> {
    let data = frame.data(0);
    let sample_count = frame.samples() * usize::from(channels);

    data.chunks_exact(4)
        .take(sample_count)
        .map(|bytes| f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        .collect()
}

impl Codec for FfmpegAudioCodec {
    type Unit = SampleBatch;

    fn decode(&mut self, packet: &Packet) -> Result<Vec<SampleBatch>> {
        let mut raw = ffmpeg_next::Packet::copy(&packet.payload);
        raw.set_pts(Some(duration_to_micros(packet.timecode)));
        self.decoder
            .send_packet(&raw)
            .map_err(|e| decode_error(&self.codec, e))?;
        Ok(self.receive())
    }

    fn flush(&mut self) -> Vec<SampleBatch> {
        if let Err(err) = self.decoder.send_eof() {
            tracing::debug!(codec = %self.codec, error = %err, "audio decoder flush failed");
            return Vec::new();
        }
        self.receive()
    }

    fn reset(&mut self) {
        self.decoder.flush();
        // The resampler keeps a few samples of delay; a fresh one starts clean.
        match build_resampler(&self.decoder, self.output) {
            Ok(resampler) => self.resampler = resampler,
            Err(err) => {
                tracing::warn!(codec = %self.codec, error = %err, "resampler rebuild failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send<T: Send>() {}

    #[test]
    fn codec_is_send() {
        assert_send::<FfmpegAudioCodec>();
    }
}

// SPDX-License-Identifier: MPL-2.0
//! Container access through `FFmpeg`'s demuxer.

use super::{init_ffmpeg, FfmpegAudioCodec, FfmpegVideoCodec, OwnedParameters};
use crate::application::port::{Codec, CodecFactory, OpenedInput, PacketSource};
use crate::domain::media::{
    AudioOutputConfig, AudioParams, Packet, SampleBatch, TrackId, TrackMeta, VideoFrame,
    VideoParams,
};
use crate::error::{Error, Result};
use crate::playback::time_units::{duration_to_micros, micros_to_duration, ticks_to_duration};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Packet source over an opened container.
pub struct FfmpegSource {
    input: ffmpeg_next::format::context::Input,
    tracks: Vec<TrackMeta>,
    /// `(numerator, denominator)` per stream index.
    time_bases: Vec<(i32, i32)>,
    duration: Option<Duration>,
    label: String,
}

// SAFETY: the format context is owned exclusively by this source and only
// touched through `&mut self`, so it is used by one thread at a time.
unsafe impl Send for FfmpegSource {}

impl FfmpegSource {
    /// Opens `path` and probes its tracks.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Open`] if the file cannot be read or parsed.
    pub fn open(path: &Path) -> Result<OpenedInput> {
        init_ffmpeg()?;
        let label = path.display().to_string();
        let input = ffmpeg_next::format::input(&path)
            .map_err(|e| Error::Open(format!("{label}: {e}")))?;

        let mut tracks = Vec::new();
        let mut time_bases = Vec::new();
        let mut parameters = HashMap::new();
        for stream in input.streams() {
            let time_base = stream.time_base();
            time_bases.push((time_base.numerator(), time_base.denominator()));

            let params = OwnedParameters(stream.parameters().clone());
            let id = TrackId(stream.index());
            let codec_id = format!("{:?}", params.0.id());
            let meta = match params.0.medium() {
                ffmpeg_next::media::Type::Video => {
                    TrackMeta::video(id, codec_id, probe_video(&params))
                }
                ffmpeg_next::media::Type::Audio => {
                    TrackMeta::audio(id, codec_id, probe_audio(&params))
                }
                _ => continue,
            };
            tracing::debug!(
                input = %label,
                track = %id,
                kind = meta.kind.label(),
                codec = %meta.codec_id,
                "track found"
            );
            tracks.push(meta);
            parameters.insert(id, params);
        }

        let duration = (input.duration() > 0).then(|| micros_to_duration(input.duration()));
        tracing::info!(
            input = %label,
            tracks = tracks.len(),
            duration_ms = ?duration.map(|d| d.as_millis()),
            "input opened"
        );

        let source = Self {
            input,
            tracks,
            time_bases,
            duration,
            label,
        };
        Ok(OpenedInput::new(
            Box::new(source),
            Box::new(FfmpegCodecs { parameters }),
        ))
    }
}

fn probe_video(params: &OwnedParameters) -> Option<VideoParams> {
    let decoder = ffmpeg_next::codec::context::Context::from_parameters(params.0.clone())
        .ok()?
        .decoder()
        .video()
        .ok()?;
    Some(VideoParams {
        width: decoder.width(),
        height: decoder.height(),
    })
}

#[allow(clippy::cast_possible_truncation)] // channel counts fit in u16
fn probe_audio(params: &OwnedParameters) -> Option<AudioParams> {
    let decoder = ffmpeg_next::codec::context::Context::from_parameters(params.0.clone())
        .ok()?
        .decoder()
        .audio()
        .ok()?;
    Some(AudioParams {
        channels: decoder.channels() as u16,
        sample_rate: decoder.rate(),
    })
}

impl PacketSource for FfmpegSource {
    fn tracks(&self) -> &[TrackMeta] {
        &self.tracks
    }

    fn duration(&self) -> Option<Duration> {
        self.duration
    }

    fn read_packet(&mut self) -> Result<Option<Packet>> {
        let mut raw = ffmpeg_next::Packet::empty();
        match raw.read(&mut self.input) {
            Ok(()) => {}
            Err(ffmpeg_next::Error::Eof) => return Ok(None),
            Err(e) => return Err(Error::Source(format!("{}: {e}", self.label))),
        }

        let stream = raw.stream();
        let timecode = match (raw.pts().or(raw.dts()), self.time_bases.get(stream)) {
            (Some(ticks), Some((numerator, denominator))) => {
                ticks_to_duration(ticks, *numerator, *denominator)
            }
            _ => Duration::ZERO,
        };
        let payload = raw.data().map(<[u8]>::to_vec).unwrap_or_default();

        let packet = Packet::new(TrackId(stream), timecode, payload);
        Ok(Some(if raw.is_key() {
            packet.keyframe()
        } else {
            packet
        }))
    }

    fn seek(&mut self, target: Duration) -> Result<()> {
        let micros = duration_to_micros(target);
        self.input.seek(micros, ..micros).map_err(|e| {
            Error::Source(format!(
                "{}: seek to {}ms failed: {e}",
                self.label,
                target.as_millis()
            ))
        })
    }
}

/// Codec factory holding the parameters of every probed track.
pub struct FfmpegCodecs {
    parameters: HashMap<TrackId, OwnedParameters>,
}

impl FfmpegCodecs {
    fn parameters(&self, track: &TrackMeta) -> Result<OwnedParameters> {
        self.parameters
            .get(&track.id)
            .cloned()
            .ok_or_else(|| Error::CodecInit {
                codec: track.codec_id.clone(),
                reason: format!("unknown track {}", track.id),
            })
    }
}

impl CodecFactory for FfmpegCodecs {
    fn video_codec(&self, track: &TrackMeta) -> Result<Box<dyn Codec<Unit = VideoFrame>>> {
        let codec = FfmpegVideoCodec::new(self.parameters(track)?, &track.codec_id)?;
        Ok(Box::new(codec))
    }

    fn audio_codec(
        &self,
        track: &TrackMeta,
        output: AudioOutputConfig,
    ) -> Result<Box<dyn Codec<Unit = SampleBatch>>> {
        let codec = FfmpegAudioCodec::new(self.parameters(track)?, &track.codec_id, output)?;
        Ok(Box::new(codec))
    }
}

// SPDX-License-Identifier: MPL-2.0
//! `FFmpeg` adapters implementing the [`PacketSource`], [`CodecFactory`] and
//! [`Codec`] ports.
//!
//! - [`FfmpegSource`]: container demuxing, one packet per `read_packet`
//! - [`FfmpegCodecs`]: builds the codecs of an opened input
//! - [`FfmpegVideoCodec`]: decode + swscale conversion to RGBA
//! - [`FfmpegAudioCodec`]: decode + swresample to the device format
//!
//! [`PacketSource`]: crate::application::port::PacketSource
//! [`CodecFactory`]: crate::application::port::CodecFactory
//! [`Codec`]: crate::application::port::Codec

mod audio;
mod source;
mod video;

pub use audio::FfmpegAudioCodec;
pub use source::{FfmpegCodecs, FfmpegSource};
pub use video::FfmpegVideoCodec;

use crate::error::{Error, Result};
use std::sync::Once;

static FFMPEG_INIT: Once = Once::new();

/// Initializes `FFmpeg` once per process and sets its log level to ERROR.
///
/// # Errors
///
/// Returns [`Error::Open`] if `FFmpeg` fails to initialize.
pub fn init_ffmpeg() -> Result<()> {
    let mut init_result: Result<()> = Ok(());

    FFMPEG_INIT.call_once(|| {
        if let Err(e) = ffmpeg_next::init() {
            init_result = Err(Error::Open(format!("FFmpeg initialization failed: {e}")));
            return;
        }

        // SAFETY: av_log_set_level is thread-safe and only affects logging
        unsafe {
            ffmpeg_next::ffi::av_log_set_level(ffmpeg_next::ffi::AV_LOG_ERROR);
        }
    });

    init_result
}

/// Codec parameters detached from their format context.
///
/// Holds an owned copy (`Parameters::clone` allocates a fresh
/// `AVCodecParameters` with no owner), so nothing else aliases it.
pub(crate) struct OwnedParameters(pub(crate) ffmpeg_next::codec::Parameters);

// SAFETY: the wrapped parameters are an owned copy without a back-reference
// to the format context; moving them between threads is sound.
unsafe impl Send for OwnedParameters {}

impl Clone for OwnedParameters {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

fn codec_init_error(codec: &str, err: impl std::fmt::Display) -> Error {
    Error::CodecInit {
        codec: codec.to_string(),
        reason: err.to_string(),
    }
}

fn decode_error(codec: &str, err: impl std::fmt::Display) -> Error {
    Error::Decode {
        codec: codec.to_string(),
        reason: err.to_string(),
    }
}

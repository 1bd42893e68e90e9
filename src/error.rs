// SPDX-License-Identifier: MPL-2.0
//! Error types for the playback pipeline.
//!
//! Only stream-open and device-init failures are terminal, and each is
//! terminal for its own subsystem. Decode-local errors are logged by the stage
//! that hit them and never unwind the pipeline.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Container could not be opened or parsed. No pipeline is started.
    #[error("Failed to open input: {0}")]
    Open(String),

    /// None of the inputs carries a video or an audio track.
    #[error("Nothing to play: no video or audio track found")]
    NothingToPlay,

    /// The codec for a track could not be initialized (unsupported codec id).
    /// The track's decoder keeps draining its queue in drop mode.
    #[error("Unsupported codec {codec}: {reason}")]
    CodecInit { codec: String, reason: String },

    /// A single packet failed to decode; the packet is skipped.
    #[error("Decoding failed: {codec} - {reason}")]
    Decode { codec: String, reason: String },

    /// The audio sink failed; only the audio path is disabled.
    #[error("Audio device error: {0}")]
    Device(String),

    /// Reading or repositioning the packet source failed.
    #[error("Packet source error: {0}")]
    Source(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns true when the error only concerns a single packet or unit.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Decode { .. } | Error::Source(_))
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

// SPDX-License-Identifier: MPL-2.0
//! Media domain types.
//!
//! This module contains the data moved between pipeline stages. None of it
//! depends on a container format or codec library.

pub mod types;

// Re-export commonly used types
pub use types::{
    AudioOutputConfig, AudioParams, Packet, SampleBatch, Timed, TrackId, TrackKind, TrackMeta,
    VideoFrame, VideoParams,
};

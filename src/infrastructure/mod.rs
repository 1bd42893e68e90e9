// SPDX-License-Identifier: MPL-2.0
//! Infrastructure layer adapters.
//!
//! Concrete implementations of the port traits defined in
//! `application::port`, wrapping external dependencies.
//!
//! # Available Adapters
//!
//! - [`ffmpeg`]: container demuxing and decoding via `FFmpeg` (implements
//!   [`PacketSource`], [`CodecFactory`] and [`Codec`])
//!
//! [`PacketSource`]: crate::application::port::PacketSource
//! [`CodecFactory`]: crate::application::port::CodecFactory
//! [`Codec`]: crate::application::port::Codec

pub mod ffmpeg;

pub use ffmpeg::{FfmpegCodecs, FfmpegSource};

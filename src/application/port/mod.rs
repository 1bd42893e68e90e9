// SPDX-License-Identifier: MPL-2.0
//! Port definitions (traits) for dependency inversion.
//!
//! This module defines abstract interfaces that infrastructure adapters implement.
//! These traits use only domain types, ensuring the pipeline remains
//! independent of the container parser, the codecs and the display.
//!
//! # Available Ports
//!
//! - [`source`]: Container demuxing ([`PacketSource`])
//! - [`codec`]: Per-track decoding ([`Codec`], [`CodecFactory`])
//! - [`presenter`]: Video display ([`VideoPresenter`])
//!
//! # Design Notes
//!
//! - All traits use domain types only (no `FFmpeg` or `cpal` types)
//! - Traits are `Send` so stages can own them on blocking threads
//! - No `async fn`: sources and codecs are driven from blocking threads

pub mod codec;
pub mod presenter;
pub mod source;

// Re-export main types for convenience
pub use codec::{Codec, CodecFactory};
pub use presenter::VideoPresenter;
pub use source::{OpenedInput, PacketSource};

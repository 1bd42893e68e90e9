// SPDX-License-Identifier: MPL-2.0
//! Domain layer - Core playback types with ZERO external dependencies.
//!
//! This module contains pure value types shared by every pipeline stage.
//! It has no dependencies on external crates (except `std`) so that stages
//! and adapters can be tested against it in isolation.
//!
//! # Modules
//!
//! - [`media`]: Tracks, packets and decoded units ([`Packet`](media::Packet),
//!   [`TrackMeta`](media::TrackMeta), [`VideoFrame`](media::VideoFrame),
//!   [`SampleBatch`](media::SampleBatch))

pub mod media;

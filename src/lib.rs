// SPDX-License-Identifier: MPL-2.0
//! `syncplay` plays the video and audio tracks of container files in sync.
//!
//! Packets flow from a [`PacketSource`](application::port::PacketSource)
//! through per-input readers and demultiplexers into one decoder per stream,
//! then through a sync engine that releases each decoded unit at its
//! presentation time. Audio goes to the output device, video to a
//! [`VideoPresenter`](application::port::VideoPresenter).
//!
//! [`playback::Player`] wires the stages together; the `FFmpeg` adapters
//! live in [`infrastructure`].

#![doc(html_root_url = "https://docs.rs/syncplay/0.1.0")]

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod playback;

// SPDX-License-Identifier: MPL-2.0
//! Playback pipeline: from packets to presented frames and samples.
//!
//! Stages, leaf-first:
//! - [`reader`]: pulls packets out of a packet source, applies seeks
//! - [`demuxer`]: routes packets to per-track queues
//! - [`decoder`]: generic track decoder stage
//! - [`engine`]: per-stream sync engine pacing units in real time
//! - [`presenter`] and [`audio_output`]: video handoff and audio device
//!
//! [`pipeline`] wires them together; [`rebase`] carries seeks and drift
//! corrections between them.

pub mod audio_output;
pub mod decoder;
pub mod demuxer;
pub mod discovery;
pub mod engine;
pub mod pipeline;
pub mod presenter;
pub mod reader;
pub mod rebase;
pub mod stats;
pub mod sync;
pub mod time_units;
pub mod volume;
pub mod wait;

pub use audio_output::{AudioDevice, AudioSink, SampleFeeder};
pub use decoder::{Decoded, TrackDecoder};
pub use demuxer::{Demuxer, Route, Routes};
pub use discovery::{discover_streams, Selection};
pub use engine::SyncEngine;
pub use pipeline::{PipelineSettings, PlaybackReport, Player, SeekControl};
pub use presenter::{CurrentFrame, PlaybackPosition};
pub use reader::{SeekRequest, SourceReader};
pub use rebase::{Rebase, RebaseBus, RebaseListener, RebaseOrigin, TickReporter};
pub use sync::{ClockState, Decision, Epoch, Thresholds};
pub use volume::{SharedVolume, Volume};
pub use wait::{wait_interruptible, WaitOutcome};

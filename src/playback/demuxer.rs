// SPDX-License-Identifier: MPL-2.0
//! Demuxer stage: fans the packets of one input out to per-track queues.
//!
//! Routing uses the video/audio track ids discovered when the input was
//! opened:
//! - only a video track → every packet goes to the video queue
//! - only an audio track → every packet goes to the audio queue
//! - both → route by id; anything else is unrouted
//!
//! A routed track without a destination (audio device missing, or the track
//! was taken from the other input) is discarded and counted. When the input
//! queue closes, dropping the destination senders closes the decoder queues.

use crate::domain::media::{Packet, TrackId};
use crate::playback::stats::DemuxStats;
use crate::playback::wait::shutdown_requested;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Track ids discovered in one input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Routes {
    pub video: Option<TrackId>,
    pub audio: Option<TrackId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Video,
    Audio,
    Unrouted,
}

impl Routes {
    /// Picks the destination of a packet of `track`.
    #[must_use]
    pub fn route(&self, track: TrackId) -> Route {
        match (self.video, self.audio) {
            (Some(_), None) => Route::Video,
            (None, Some(_)) => Route::Audio,
            (Some(video), Some(_)) if track == video => Route::Video,
            (Some(_), Some(audio)) if track == audio => Route::Audio,
            _ => Route::Unrouted,
        }
    }
}

pub struct Demuxer {
    label: String,
    routes: Routes,
    video: Option<mpsc::Sender<Packet>>,
    audio: Option<mpsc::Sender<Packet>>,
    shutdown: watch::Receiver<bool>,
    stats: Arc<DemuxStats>,
}

impl Demuxer {
    #[must_use]
    pub fn new(
        label: impl Into<String>,
        routes: Routes,
        shutdown: watch::Receiver<bool>,
        stats: Arc<DemuxStats>,
    ) -> Self {
        Self {
            label: label.into(),
            routes,
            video: None,
            audio: None,
            shutdown,
            stats,
        }
    }

    #[must_use]
    pub fn with_video(mut self, video: mpsc::Sender<Packet>) -> Self {
        self.video = Some(video);
        self
    }

    #[must_use]
    pub fn with_audio(mut self, audio: mpsc::Sender<Packet>) -> Self {
        self.audio = Some(audio);
        self
    }

    pub fn spawn(self, input: mpsc::Receiver<Packet>) -> JoinHandle<()> {
        tokio::spawn(self.run(input))
    }

    pub async fn run(mut self, mut input: mpsc::Receiver<Packet>) {
        loop {
            let next = tokio::select! {
                biased;
                () = shutdown_requested(&mut self.shutdown) => break,
                packet = input.recv() => packet,
            };
            let Some(packet) = next else {
                tracing::debug!(input = %self.label, "packet sequence exhausted");
                break;
            };

            let route = self.routes.route(packet.track);
            let destination = match route {
                Route::Video => &mut self.video,
                Route::Audio => &mut self.audio,
                Route::Unrouted => {
                    self.stats.record_unrouted();
                    continue;
                }
            };
            let Some(queue) = destination.as_ref() else {
                self.stats.record_discarded();
                continue;
            };

            let sent = tokio::select! {
                biased;
                () = shutdown_requested(&mut self.shutdown) => break,
                sent = queue.send(packet) => sent,
            };
            match (sent, route) {
                (Ok(()), Route::Video) => self.stats.record_video(),
                (Ok(()), _) => self.stats.record_audio(),
                (Err(_), _) => {
                    tracing::debug!(input = %self.label, ?route, "decoder queue closed");
                    *destination = None;
                    self.stats.record_discarded();
                    if self.video.is_none() && self.audio.is_none() {
                        break;
                    }
                }
            }
        }
        // Dropping the senders closes the decoder queues; dropping `input`
        // stops the reader, which releases the source.
    }
}

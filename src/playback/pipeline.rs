// SPDX-License-Identifier: MPL-2.0
//! Pipeline assembly: wires readers, demuxers, decoders, sync engines and
//! presenters for the selected streams.
//!
//! ```text
//! input ─▶ SourceReader ─▶ Demuxer ─┬─▶ TrackDecoder ─▶ SyncEngine ─▶ video presenter
//!                                   └─▶ TrackDecoder ─▶ SyncEngine ─▶ audio device
//! SeekControl ──▶ readers (SeekRequest) + rebase bus (every engine, the feeder)
//! clock master ──▶ correction ticks ──▶ following engine
//! ```

use crate::application::port::{Codec, OpenedInput, VideoPresenter};
use crate::config::{ClockMaster, Config, DEFAULT_VOLUME};
use crate::domain::media::{Packet, SampleBatch, Timed, TrackMeta, VideoFrame};
use crate::error::Result;
use crate::playback::audio_output::{AudioDevice, AudioSink, SampleFeeder};
use crate::playback::decoder::{Decoded, TrackDecoder};
use crate::playback::demuxer::Demuxer;
use crate::playback::discovery::discover_streams;
use crate::playback::presenter::{spawn_video_presenter, CurrentFrame, PlaybackPosition};
use crate::playback::reader::{SeekRequest, SourceReader};
use crate::playback::rebase::{Rebase, RebaseBus, TickReporter, CORRECTION_BACKLOG};
use crate::playback::stats::{
    DecodeSnapshot, DecodeStats, DemuxSnapshot, DemuxStats, SyncSnapshot, SyncStats,
};
use crate::playback::sync::{ClockState, Thresholds};
use crate::playback::volume::{SharedVolume, Volume};
use crate::playback::SyncEngine;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Longest wait for the audio device to play out its last samples.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);
const DRAIN_POLL: Duration = Duration::from_millis(20);

/// Runtime parameters of one pipeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineSettings {
    pub clock_master: ClockMaster,
    pub video_thresholds: Thresholds,
    pub audio_thresholds: Thresholds,
    pub correction_interval: Duration,
    pub packet_capacity: usize,
    pub decoded_capacity: usize,
    pub video_handoff: usize,
    pub audio_handoff: usize,
    pub volume: Volume,
}

impl PipelineSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let sync = &config.sync;
        let thresholds = |stale_past| Thresholds {
            stale_past,
            stale_future: sync.stale_future(),
            correction_tolerance: sync.correction_tolerance(),
        };
        Self {
            clock_master: sync.clock_master(),
            video_thresholds: thresholds(sync.video_stale_past()),
            audio_thresholds: thresholds(sync.audio_stale_past()),
            correction_interval: sync.correction_interval(),
            packet_capacity: config.queues.packet_capacity(),
            decoded_capacity: config.queues.decoded_capacity(),
            video_handoff: config.queues.video_handoff(),
            audio_handoff: config.queues.audio_handoff(),
            volume: Volume::new(config.audio.volume.unwrap_or(DEFAULT_VOLUME)),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// User-facing seek surface. Cloneable, usable from any task or thread.
#[derive(Debug, Clone)]
pub struct SeekControl {
    readers: Vec<mpsc::UnboundedSender<SeekRequest>>,
    bus: RebaseBus,
    generation: Arc<Mutex<u64>>,
}

impl SeekControl {
    /// Repositions every reader to `target` and rebases every clock onto
    /// it. Returns the seek generation.
    ///
    /// Clocks are rebased before the readers move, so no post-seek packet can
    /// reach an engine still on the previous generation.
    pub fn seek(&self, target: Duration) -> u64 {
        let mut current = self.generation.lock();
        *current += 1;
        let generation = *current;

        self.bus.publish(Rebase::seek(target, generation));
        for reader in &self.readers {
            // A finished reader has nothing left to reposition.
            let _ = reader.send(SeekRequest { target, generation });
        }
        tracing::info!(target_ms = target.as_millis(), generation, "seek requested");
        generation
    }
}

/// Counters of every stage, captured at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackReport {
    pub demux: Vec<DemuxSnapshot>,
    pub video_decode: DecodeSnapshot,
    pub video_sync: SyncSnapshot,
    pub audio_decode: DecodeSnapshot,
    pub audio_sync: SyncSnapshot,
}

impl PlaybackReport {
    pub fn log(&self) {
        for (input, demux) in self.demux.iter().enumerate() {
            tracing::info!(
                input,
                video = demux.video,
                audio = demux.audio,
                unrouted = demux.unrouted,
                discarded = demux.discarded,
                "demux summary"
            );
        }
        for (track, decode, sync) in [
            ("video", &self.video_decode, &self.video_sync),
            ("audio", &self.audio_decode, &self.audio_sync),
        ] {
            tracing::info!(
                track,
                decoded = decode.decoded,
                decode_errors = decode.errors,
                emitted = sync.emitted,
                dropped_late = sync.dropped_late,
                dropped_early = sync.dropped_early,
                superseded = sync.superseded,
                seeks = sync.seeks,
                resyncs = sync.resyncs,
                corrections = sync.corrections,
                "playback summary"
            );
        }
    }
}

#[derive(Debug, Default)]
struct PipelineStats {
    demux: Vec<Arc<DemuxStats>>,
    video_decode: Arc<DecodeStats>,
    video_sync: Arc<SyncStats>,
    audio_decode: Arc<DecodeStats>,
    audio_sync: Arc<SyncStats>,
}

/// A running playback pipeline.
///
/// Dropping the player signals shutdown to every stage.
pub struct Player {
    shutdown: watch::Sender<bool>,
    seek: SeekControl,
    position: PlaybackPosition,
    current: CurrentFrame,
    volume: SharedVolume,
    duration: Option<Duration>,
    stats: PipelineStats,
    tasks: Vec<JoinHandle<()>>,
    audio: Option<AudioSink>,
    has_video: bool,
}

impl Player {
    /// Builds and starts the pipeline. Must be called within a tokio runtime.
    ///
    /// Codec initialization failures put the affected decoder in drop mode;
    /// an audio device failure (or `audio` being `None`) disables the audio
    /// path. Neither stops playback.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NothingToPlay`](crate::error::Error::NothingToPlay)
    /// when no input has a video or audio track.
    pub fn start(
        inputs: Vec<OpenedInput>,
        settings: PipelineSettings,
        presenter: Box<dyn VideoPresenter>,
        audio: Option<AudioDevice>,
    ) -> Result<Self> {
        let track_lists: Vec<&[TrackMeta]> =
            inputs.iter().map(|input| input.source.tracks()).collect();
        let selection = discover_streams(&track_lists)?;
        let video_meta = selection.video.and_then(|index| {
            inputs[index]
                .source
                .tracks()
                .iter()
                .find(|track| Some(track.id) == selection.routes[index].video)
                .cloned()
        });
        let audio_meta = selection.audio.and_then(|index| {
            inputs[index]
                .source
                .tracks()
                .iter()
                .find(|track| Some(track.id) == selection.routes[index].audio)
                .cloned()
        });
        let duration = inputs
            .iter()
            .enumerate()
            .filter(|(index, _)| selection.uses(*index))
            .filter_map(|(_, input)| input.source.duration())
            .max();

        let (shutdown, shutdown_rx) = watch::channel(false);
        let bus = RebaseBus::new();
        let position = PlaybackPosition::default();
        let current = CurrentFrame::default();
        let volume = SharedVolume::new(settings.volume);
        let mut stats = PipelineStats::default();
        let mut tasks = Vec::new();

        let playing_audio = audio_meta.is_some() && audio.is_some();
        let playing_video = video_meta.is_some();
        let (audio_ticks, video_ticks, video_corrections, audio_corrections) =
            correction_links(&settings, playing_video, playing_audio);

        let mut video_packets: Option<mpsc::Sender<Packet>> = None;
        let mut audio_packets: Option<mpsc::Sender<Packet>> = None;

        if let (Some(index), Some(meta)) = (selection.video, &video_meta) {
            let decoder = track_decoder(
                "video",
                inputs[index].codecs.video_codec(meta),
                meta,
                &stats.video_decode,
            );
            let (packet_tx, packet_rx) = mpsc::channel(settings.packet_capacity);
            let (decoded_tx, decoded_rx) = mpsc::channel(settings.decoded_capacity);
            let (handoff_tx, handoff_rx) =
                mpsc::channel::<Decoded<VideoFrame>>(settings.video_handoff);

            let mut engine = SyncEngine::new(
                "video",
                ClockState::new(settings.video_thresholds),
                bus.listener(video_corrections),
                shutdown_rx.clone(),
                Arc::clone(&stats.video_sync),
            )
            .with_position(position.clone());
            if let Some(ticks) = video_ticks {
                engine = engine.with_ticks(ticks);
            }

            tasks.push(decoder.spawn(packet_rx, decoded_tx));
            tasks.push(engine.spawn(decoded_rx, handoff_tx));
            tasks.push(spawn_video_presenter(handoff_rx, current.clone(), presenter));
            video_packets = Some(packet_tx);
            tracing::info!(track = %meta.id, codec = %meta.codec_id, "video path started");
        }

        let mut sink = None;
        if let (Some(index), Some(meta), Some(device)) = (selection.audio, &audio_meta, audio) {
            let output_config = device.config();
            let (handoff_tx, handoff_rx) =
                mpsc::channel::<Decoded<SampleBatch>>(settings.audio_handoff);
            let mut feeder = SampleFeeder::new(handoff_rx, bus.subscribe());
            if let Some(ticks) = audio_ticks {
                feeder = feeder.with_ticks(ticks);
            }

            match device.start(feeder, volume.clone()) {
                Err(err) => {
                    tracing::warn!(
                        track = %meta.id,
                        error = %err,
                        "audio output failed, audio is discarded"
                    );
                }
                Ok(started) => {
                    let decoder = track_decoder(
                        "audio",
                        inputs[index].codecs.audio_codec(meta, output_config),
                        meta,
                        &stats.audio_decode,
                    );
                    let (packet_tx, packet_rx) = mpsc::channel(settings.packet_capacity);
                    let (decoded_tx, decoded_rx) = mpsc::channel(settings.decoded_capacity);

                    let mut engine = SyncEngine::new(
                        "audio",
                        ClockState::new(settings.audio_thresholds),
                        bus.listener(audio_corrections),
                        shutdown_rx.clone(),
                        Arc::clone(&stats.audio_sync),
                    );
                    if !playing_video {
                        engine = engine.with_position(position.clone());
                    }

                    tasks.push(decoder.spawn(packet_rx, decoded_tx));
                    tasks.push(engine.spawn(decoded_rx, handoff_tx));
                    audio_packets = Some(packet_tx);
                    sink = Some(started);
                    tracing::info!(
                        track = %meta.id,
                        codec = %meta.codec_id,
                        sample_rate = output_config.sample_rate,
                        channels = output_config.channels,
                        "audio path started"
                    );
                }
            }
        } else if let Some(meta) = &audio_meta {
            tracing::warn!(track = %meta.id, "no audio device, audio is discarded");
        }

        let mut readers = Vec::new();
        for (index, input) in inputs.into_iter().enumerate() {
            if !selection.uses(index) {
                continue;
            }
            let label = format!("input{index}");
            let demux_stats = Arc::new(DemuxStats::default());
            stats.demux.push(Arc::clone(&demux_stats));

            let mut demuxer = Demuxer::new(
                label.clone(),
                selection.routes[index],
                shutdown_rx.clone(),
                demux_stats,
            );
            if selection.video == Some(index) {
                if let Some(video) = video_packets.take() {
                    demuxer = demuxer.with_video(video);
                }
            }
            if selection.audio == Some(index) {
                if let Some(audio) = audio_packets.take() {
                    demuxer = demuxer.with_audio(audio);
                }
            }

            let (seek_tx, seek_rx) = mpsc::unbounded_channel();
            let (packet_tx, packet_rx) = mpsc::channel(settings.packet_capacity);
            readers.push(seek_tx);
            let reader = SourceReader::new(label, input.source, seek_rx, shutdown_rx.clone());
            tasks.push(reader.spawn(packet_tx));
            tasks.push(demuxer.spawn(packet_rx));
        }

        Ok(Self {
            shutdown,
            seek: SeekControl {
                readers,
                bus,
                generation: Arc::new(Mutex::new(0)),
            },
            position,
            current,
            volume,
            duration,
            stats,
            tasks,
            audio: sink,
            has_video: playing_video,
        })
    }

    #[must_use]
    pub fn seek_control(&self) -> SeekControl {
        self.seek.clone()
    }

    /// Timecode currently presented.
    #[must_use]
    pub fn position(&self) -> Duration {
        self.position.get()
    }

    #[must_use]
    pub fn current_frame(&self) -> CurrentFrame {
        self.current.clone()
    }

    #[must_use]
    pub fn volume(&self) -> SharedVolume {
        self.volume.clone()
    }

    /// Longest duration reported by the selected inputs.
    #[must_use]
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    #[must_use]
    pub fn has_video(&self) -> bool {
        self.has_video
    }

    #[must_use]
    pub fn has_audio(&self) -> bool {
        self.audio.is_some()
    }

    /// The running audio sink, if the audio path is active.
    pub fn audio_sink(&mut self) -> Option<&mut AudioSink> {
        self.audio.as_mut()
    }

    /// Aborts every wait and blocked send. Stages then wind down on their
    /// own; call [`wait`](Self::wait) to join them.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
        tracing::debug!("shutdown signalled");
    }

    /// Waits until every stage has returned and the audio device has played
    /// out what it was given.
    ///
    /// Cancel-safe: stages already joined are not awaited again.
    pub async fn wait(&mut self) {
        while let Some(task) = self.tasks.last_mut() {
            if let Err(err) = task.await {
                tracing::warn!(error = %err, "pipeline stage panicked");
            }
            self.tasks.pop();
        }

        let stopping = *self.shutdown.borrow();
        if let Some(sink) = &self.audio {
            if !stopping {
                let drained = tokio::time::timeout(DRAIN_TIMEOUT, async {
                    while !sink.is_drained() {
                        tokio::time::sleep(DRAIN_POLL).await;
                    }
                })
                .await;
                if drained.is_err() {
                    tracing::debug!("audio device did not drain in time");
                }
            }
        }
        tracing::info!("playback finished");
    }

    /// Snapshot of every stage's counters.
    #[must_use]
    pub fn report(&self) -> PlaybackReport {
        PlaybackReport {
            demux: self.stats.demux.iter().map(|stats| stats.snapshot()).collect(),
            video_decode: self.stats.video_decode.snapshot(),
            video_sync: self.stats.video_sync.snapshot(),
            audio_decode: self.stats.audio_decode.snapshot(),
            audio_sync: self.stats.audio_sync.snapshot(),
        }
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}

/// Builds a decoding stage, falling back to drop mode when the codec could
/// not be created.
fn track_decoder<U: Timed + Send + 'static>(
    label: &'static str,
    codec: Result<Box<dyn Codec<Unit = U>>>,
    meta: &TrackMeta,
    stats: &Arc<DecodeStats>,
) -> TrackDecoder<U> {
    match codec {
        Ok(codec) => TrackDecoder::new(label, codec, Arc::clone(stats)),
        Err(err) => {
            tracing::warn!(
                track = %meta.id,
                codec = %meta.codec_id,
                error = %err,
                "decoder unavailable, packets are discarded"
            );
            TrackDecoder::draining(label, Arc::clone(stats))
        }
    }
}

type CorrectionLinks = (
    Option<TickReporter>,
    Option<TickReporter>,
    Option<mpsc::Receiver<Rebase>>,
    Option<mpsc::Receiver<Rebase>>,
);

/// Connects the clock master to the stream that follows it. Returns the
/// tick reporters for the audio feeder and the video engine, then the
/// correction receivers for the video and audio engines.
fn correction_links(
    settings: &PipelineSettings,
    playing_video: bool,
    playing_audio: bool,
) -> CorrectionLinks {
    if !(playing_video && playing_audio) {
        return (None, None, None, None);
    }
    let (tick_tx, tick_rx) = mpsc::channel(CORRECTION_BACKLOG);
    let reporter = TickReporter::new(tick_tx, settings.correction_interval);
    match settings.clock_master {
        ClockMaster::Audio => (Some(reporter), None, Some(tick_rx), None),
        ClockMaster::Video => (None, Some(reporter), None, Some(tick_rx)),
        ClockMaster::Independent => (None, None, None, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_follow_config() {
        let mut config = Config::default();
        config.sync.clock_master = Some(ClockMaster::Video);
        config.sync.audio_stale_past_ms = Some(200);
        config.queues.video_handoff = Some(5);
        config.audio.volume = Some(1.2);

        let settings = PipelineSettings::from_config(&config);
        assert_eq!(settings.clock_master, ClockMaster::Video);
        assert_eq!(settings.audio_thresholds.stale_past, Duration::from_millis(200));
        assert_eq!(settings.video_thresholds.stale_past, Duration::from_secs(1));
        assert_eq!(settings.video_thresholds.stale_future, Duration::from_secs(10));
        assert_eq!(settings.video_handoff, 5);
        assert_eq!(settings.audio_handoff, 1);
        assert_eq!(settings.volume.value(), 1.2);
    }

    #[tokio::test]
    async fn seek_rebases_clocks_before_readers() {
        let bus = RebaseBus::new();
        let mut seeks = bus.subscribe();
        let (reader_tx, mut reader_rx) = mpsc::unbounded_channel();
        let control = SeekControl {
            readers: vec![reader_tx],
            bus,
            generation: Arc::new(Mutex::new(0)),
        };

        assert_eq!(control.seek(Duration::from_secs(5)), 1);
        assert_eq!(control.clone().seek(Duration::from_secs(2)), 2);

        let rebase = seeks.try_recv().unwrap();
        assert!(rebase.is_seek());
        assert_eq!(rebase.generation, 1);
        assert_eq!(
            reader_rx.try_recv().unwrap(),
            SeekRequest {
                target: Duration::from_secs(5),
                generation: 1,
            }
        );
        assert_eq!(reader_rx.try_recv().unwrap().generation, 2);
    }

    #[test]
    fn corrections_link_master_to_follower() {
        let mut settings = PipelineSettings::default();

        let (audio_ticks, video_ticks, video_rx, audio_rx) =
            correction_links(&settings, true, true);
        assert!(audio_ticks.is_some() && video_rx.is_some());
        assert!(video_ticks.is_none() && audio_rx.is_none());

        settings.clock_master = ClockMaster::Video;
        let (audio_ticks, video_ticks, video_rx, audio_rx) =
            correction_links(&settings, true, true);
        assert!(video_ticks.is_some() && audio_rx.is_some());
        assert!(audio_ticks.is_none() && video_rx.is_none());

        settings.clock_master = ClockMaster::Independent;
        let links = correction_links(&settings, true, true);
        assert!(links.0.is_none() && links.1.is_none() && links.2.is_none() && links.3.is_none());

        settings.clock_master = ClockMaster::Audio;
        let links = correction_links(&settings, true, false);
        assert!(links.0.is_none() && links.2.is_none());
    }
}

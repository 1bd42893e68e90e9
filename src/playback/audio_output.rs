// SPDX-License-Identifier: MPL-2.0
//! Audio output using cpal.
//!
//! The device callback pulls PCM from a [`SampleFeeder`], which reads the
//! audio handoff queue without ever blocking: an empty queue plays silence.
//! When audio is the clock master the feeder also reports the position at
//! the start of each device buffer as a correction tick.

use crate::domain::media::{AudioOutputConfig, SampleBatch};
use crate::error::{Error, Result};
use crate::playback::decoder::Decoded;
use crate::playback::rebase::{Rebase, TickReporter};
use crate::playback::volume::SharedVolume;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;

/// Pulls sample batches out of the audio handoff queue into device buffers.
pub struct SampleFeeder {
    batches: mpsc::Receiver<Decoded<SampleBatch>>,
    seeks: broadcast::Receiver<Rebase>,
    ticks: Option<TickReporter>,
    current: Option<(SampleBatch, usize)>,
    generation: u64,
    drained: Arc<AtomicBool>,
}

impl SampleFeeder {
    #[must_use]
    pub fn new(
        batches: mpsc::Receiver<Decoded<SampleBatch>>,
        seeks: broadcast::Receiver<Rebase>,
    ) -> Self {
        Self {
            batches,
            seeks,
            ticks: None,
            current: None,
            generation: 0,
            drained: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Makes the device the clock master.
    #[must_use]
    pub fn with_ticks(mut self, ticks: TickReporter) -> Self {
        self.ticks = Some(ticks);
        self
    }

    /// Flag raised once the handoff queue is closed and fully played.
    #[must_use]
    pub fn drained(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.drained)
    }

    /// Fills `out` with interleaved samples scaled by `gain`, padding with
    /// silence when no batch is ready. Returns the number of samples taken
    /// from batches.
    pub fn fill(&mut self, out: &mut [f32], gain: f32) -> usize {
        self.poll_seeks();
        self.load_next();

        if let (Some(ticks), Some((batch, cursor))) = (&mut self.ticks, &self.current) {
            let position = batch.timecode + batch.offset_duration(*cursor);
            ticks.report(position, self.generation, Instant::now());
        }

        let mut written = 0;
        while written < out.len() {
            let Some((batch, cursor)) = &mut self.current else {
                if !self.load_next() {
                    break;
                }
                continue;
            };
            let available = &batch.pcm[*cursor..];
            let take = available.len().min(out.len() - written);
            for (dst, src) in out[written..written + take].iter_mut().zip(available) {
                // Just below 1.0: i16 conversion overflows at exactly 1.0.
                *dst = (src * gain).clamp(-1.0, 0.999_999_9);
            }
            written += take;
            *cursor += take;
            if *cursor >= batch.pcm.len() {
                self.current = None;
            }
        }

        out[written..].fill(0.0);
        written
    }

    fn poll_seeks(&mut self) {
        loop {
            match self.seeks.try_recv() {
                Ok(rebase) => {
                    if rebase.is_seek() && rebase.generation >= self.generation {
                        self.generation = rebase.generation;
                        self.current = None;
                    }
                }
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "feeder seek listener lagged");
                }
                Err(_) => break,
            }
        }
    }

    /// Makes sure a batch is current. Returns false when none is available.
    fn load_next(&mut self) -> bool {
        while self.current.is_none() {
            match self.batches.try_recv() {
                Ok(decoded) if decoded.generation < self.generation => {}
                Ok(decoded) => {
                    // A newer generation means a seek this feeder lagged past.
                    self.generation = decoded.generation;
                    self.current = Some((decoded.unit, 0));
                }
                Err(mpsc::error::TryRecvError::Empty) => return false,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    self.drained.store(true, Ordering::Release);
                    return false;
                }
            }
        }
        true
    }
}

/// Channels requested from the device. Decoders downmix to stereo.
const MAX_OUTPUT_CHANNELS: u16 = 2;

struct OpenedDevice {
    device: cpal::Device,
    stream: cpal::StreamConfig,
    format: cpal::SampleFormat,
}

/// Output device and the format it plays.
pub struct AudioDevice {
    opened: Option<OpenedDevice>,
    config: AudioOutputConfig,
}

impl AudioDevice {
    /// Opens the system's default output device.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Device`] when no device exists or its configuration
    /// cannot be queried.
    pub fn open_default() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Device("no audio output device found".to_string()))?;
        let supported = device
            .default_output_config()
            .map_err(|e| Error::Device(format!("failed to get audio config: {e}")))?;

        let format = supported.sample_format();
        let mut stream: cpal::StreamConfig = supported.into();
        stream.channels = stream.channels.clamp(1, MAX_OUTPUT_CHANNELS);
        let config = AudioOutputConfig {
            sample_rate: stream.sample_rate,
            channels: stream.channels,
        };
        tracing::info!(
            sample_rate = config.sample_rate,
            channels = config.channels,
            ?format,
            "audio device opened"
        );
        Ok(Self {
            opened: Some(OpenedDevice {
                device,
                stream,
                format,
            }),
            config,
        })
    }

    /// A device with no hardware behind it. The feeder stays in the sink and
    /// is driven by the caller.
    #[must_use]
    pub fn detached(config: AudioOutputConfig) -> Self {
        Self {
            opened: None,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> AudioOutputConfig {
        self.config
    }

    /// Starts playback of everything `feeder` yields.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Device`] if the stream cannot be built or started.
    pub fn start(self, feeder: SampleFeeder, volume: SharedVolume) -> Result<AudioSink> {
        let drained = feeder.drained();
        let Some(OpenedDevice {
            device,
            stream: stream_config,
            format,
        }) = self.opened
        else {
            return Ok(AudioSink {
                _stream: None,
                feeder: Some(feeder),
                volume,
                drained,
            });
        };

        let stream = match format {
            cpal::SampleFormat::F32 => {
                build_stream::<f32>(&device, &stream_config, feeder, volume.clone())?
            }
            cpal::SampleFormat::I16 => {
                build_stream::<i16>(&device, &stream_config, feeder, volume.clone())?
            }
            cpal::SampleFormat::U16 => {
                build_stream::<u16>(&device, &stream_config, feeder, volume.clone())?
            }
            other => {
                return Err(Error::Device(format!("unsupported sample format {other:?}")));
            }
        };
        stream
            .play()
            .map_err(|e| Error::Device(format!("failed to start audio stream: {e}")))?;

        Ok(AudioSink {
            _stream: Some(stream),
            feeder: None,
            volume,
            drained,
        })
    }
}

/// Device samples converted per pass when the stream does not fix its
/// buffer size. Even, so a pass never splits a stereo frame.
const DEFAULT_CALLBACK_CHUNK: usize = 4_096;

/// Scratch length for a stream: one whole buffer when the size is fixed.
fn scratch_len(config: &cpal::StreamConfig) -> usize {
    match config.buffer_size {
        cpal::BufferSize::Fixed(frames) => {
            (frames as usize * usize::from(config.channels)).max(1)
        }
        cpal::BufferSize::Default => DEFAULT_CALLBACK_CHUNK,
    }
}

fn build_stream<T: cpal::SizedSample + cpal::FromSample<f32>>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut feeder: SampleFeeder,
    volume: SharedVolume,
) -> Result<cpal::Stream> {
    // Sized once here; the callback never allocates.
    let mut scratch = vec![0.0f32; scratch_len(config)];
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                render(&mut feeder, &mut scratch, data, volume.get().gain());
            },
            |err| {
                tracing::warn!(error = %err, "audio output error");
            },
            None,
        )
        .map_err(|e| Error::Device(format!("failed to build audio stream: {e}")))
}

/// Fills a device buffer through `scratch`, one scratch length at a time.
fn render<T: cpal::SizedSample + cpal::FromSample<f32>>(
    feeder: &mut SampleFeeder,
    scratch: &mut [f32],
    data: &mut [T],
    gain: f32,
) {
    for chunk in data.chunks_mut(scratch.len()) {
        let pcm = &mut scratch[..chunk.len()];
        feeder.fill(pcm, gain);
        for (sample, value) in chunk.iter_mut().zip(pcm.iter()) {
            *sample = T::from_sample(*value);
        }
    }
}

/// Running audio output. Dropping it stops the stream.
pub struct AudioSink {
    _stream: Option<cpal::Stream>,
    feeder: Option<SampleFeeder>,
    volume: SharedVolume,
    drained: Arc<AtomicBool>,
}

impl AudioSink {
    /// Hands out the feeder of a detached sink.
    pub fn take_feeder(&mut self) -> Option<SampleFeeder> {
        self.feeder.take()
    }

    #[must_use]
    pub fn volume(&self) -> SharedVolume {
        self.volume.clone()
    }

    /// True once every queued sample has been handed to the device.
    #[must_use]
    pub fn is_drained(&self) -> bool {
        self.drained.load(Ordering::Acquire)
    }
}

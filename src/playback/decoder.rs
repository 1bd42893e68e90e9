// SPDX-License-Identifier: MPL-2.0
//! Track decoder stage, generic over the decoded unit.
//!
//! The stage owns a [`Codec`] and runs on a blocking thread, since codec
//! work is CPU bound and the `FFmpeg` contexts must stay on one thread.
//! Packets go in, decoded units tagged with the packet's seek generation come
//! out, in order. When the codec failed to initialize the stage still drains
//! its input so the demuxer never stalls on it.

use crate::application::port::Codec;
use crate::domain::media::{Packet, Timed};
use crate::playback::stats::DecodeStats;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A decoded unit and the seek generation of the packet it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded<U> {
    pub generation: u64,
    pub unit: U,
}

pub struct TrackDecoder<U> {
    label: &'static str,
    codec: Option<Box<dyn Codec<Unit = U>>>,
    stats: Arc<DecodeStats>,
}

impl<U: Timed + Send + 'static> TrackDecoder<U> {
    /// Creates a decoding stage.
    #[must_use]
    pub fn new(label: &'static str, codec: Box<dyn Codec<Unit = U>>, stats: Arc<DecodeStats>) -> Self {
        Self {
            label,
            codec: Some(codec),
            stats,
        }
    }

    /// Creates a stage that discards every packet without decode attempts.
    #[must_use]
    pub fn draining(label: &'static str, stats: Arc<DecodeStats>) -> Self {
        Self {
            label,
            codec: None,
            stats,
        }
    }

    /// Runs the stage on the blocking thread pool.
    pub fn spawn(
        self,
        input: mpsc::Receiver<Packet>,
        output: mpsc::Sender<Decoded<U>>,
    ) -> JoinHandle<()> {
        tokio::task::spawn_blocking(move || self.run(input, output))
    }

    /// Decodes until `input` closes, then flushes the codec. Returns early
    /// when the consumer of `output` goes away. A packet from a new seek
    /// generation resets the codec first, so nothing buffered before the
    /// seek comes out after it. A decode error that is not recoverable turns
    /// the stage into a draining one.
    ///
    /// Blocks the calling thread: never call it from an async context.
    pub fn run(mut self, mut input: mpsc::Receiver<Packet>, output: mpsc::Sender<Decoded<U>>) {
        let Some(mut codec) = self.codec.take() else {
            while input.blocking_recv().is_some() {
                self.stats.record_discarded();
            }
            tracing::debug!(track = self.label, "draining decoder finished");
            return;
        };

        let mut generation = 0;
        while let Some(packet) = input.blocking_recv() {
            if packet.generation != generation {
                codec.reset();
                self.stats.record_reset();
                tracing::debug!(
                    track = self.label,
                    generation = packet.generation,
                    "codec reset after seek"
                );
                generation = packet.generation;
            }
            match codec.decode(&packet) {
                Ok(units) => {
                    if !self.forward(units, generation, &output) {
                        return;
                    }
                }
                Err(err) if err.is_recoverable() => {
                    self.stats.record_error();
                    tracing::warn!(
                        track = self.label,
                        timecode_ms = packet.timecode.as_millis(),
                        error = %err,
                        "skipping undecodable packet"
                    );
                }
                Err(err) => {
                    self.stats.record_error();
                    tracing::error!(track = self.label, error = %err, "decoder stopped");
                    while input.blocking_recv().is_some() {
                        self.stats.record_discarded();
                    }
                    return;
                }
            }
        }

        let tail = codec.flush();
        self.forward(tail, generation, &output);
        tracing::debug!(track = self.label, "decoder finished");
    }

    fn forward(&self, units: Vec<U>, generation: u64, output: &mpsc::Sender<Decoded<U>>) -> bool {
        for unit in units {
            self.stats.record_decoded();
            if output.blocking_send(Decoded { generation, unit }).is_err() {
                tracing::debug!(track = self.label, "decoded queue consumer gone");
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::media::{TrackId, VideoFrame};
    use crate::error::{Error, Result};
    use std::time::Duration;

    /// Fails on packets whose payload starts with 0xFF, gives up for good on
    /// 0xEE, holds one frame back like a reordering codec.
    struct FlakyCodec {
        held: Option<VideoFrame>,
    }

    impl Codec for FlakyCodec {
        type Unit = VideoFrame;

        fn decode(&mut self, packet: &Packet) -> Result<Vec<VideoFrame>> {
            match packet.payload.first().copied() {
                Some(0xFF) => {
                    return Err(Error::Decode {
                        codec: "flaky".into(),
                        reason: "corrupt".into(),
                    })
                }
                Some(0xEE) => {
                    return Err(Error::CodecInit {
                        codec: "flaky".into(),
                        reason: "hardware context lost".into(),
                    })
                }
                _ => {}
            }
            let frame = VideoFrame::new(1, 1, vec![0; 4], packet.timecode);
            Ok(self.held.replace(frame).into_iter().collect())
        }

        fn flush(&mut self) -> Vec<VideoFrame> {
            self.held.take().into_iter().collect()
        }

        fn reset(&mut self) {
            self.held = None;
        }
    }

    fn packets(count: u64, corrupt_index: Option<u64>) -> mpsc::Receiver<Packet> {
        let (tx, rx) = mpsc::channel(count as usize + 1);
        for i in 0..count {
            let payload = if Some(i) == corrupt_index {
                vec![0xFF]
            } else {
                vec![0x00]
            };
            tx.try_send(Packet::new(TrackId(0), Duration::from_millis(i * 40), payload))
                .unwrap();
        }
        rx
    }

    fn collect(mut rx: mpsc::Receiver<Decoded<VideoFrame>>) -> Vec<Decoded<VideoFrame>> {
        let mut out = Vec::new();
        while let Ok(decoded) = rx.try_recv() {
            out.push(decoded);
        }
        out
    }

    #[test]
    fn one_corrupt_packet_in_a_hundred_yields_ninety_nine_units_in_order() {
        let stats = Arc::new(DecodeStats::default());
        let (out_tx, out_rx) = mpsc::channel(128);
        let decoder = TrackDecoder::new("video", Box::new(FlakyCodec { held: None }), Arc::clone(&stats));

        decoder.run(packets(100, Some(57)), out_tx);

        let units = collect(out_rx);
        assert_eq!(units.len(), 99);
        assert!(units
            .windows(2)
            .all(|pair| pair[0].unit.timecode < pair[1].unit.timecode));
        assert!(units
            .iter()
            .all(|d| d.unit.timecode != Duration::from_millis(57 * 40)));

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.decoded, 99);
        assert_eq!(snapshot.errors, 1);
    }

    #[test]
    fn flush_emits_buffered_tail() {
        let (out_tx, out_rx) = mpsc::channel(8);
        let decoder = TrackDecoder::new(
            "video",
            Box::new(FlakyCodec { held: None }),
            Arc::new(DecodeStats::default()),
        );
        decoder.run(packets(1, None), out_tx);
        assert_eq!(collect(out_rx).len(), 1);
    }

    #[test]
    fn units_carry_packet_generation() {
        let (in_tx, in_rx) = mpsc::channel(4);
        let mut packet = Packet::new(TrackId(0), Duration::from_secs(5), vec![0]);
        packet.generation = 3;
        in_tx.try_send(packet).unwrap();
        drop(in_tx);

        let (out_tx, out_rx) = mpsc::channel(4);
        TrackDecoder::new(
            "video",
            Box::new(FlakyCodec { held: None }),
            Arc::new(DecodeStats::default()),
        )
        .run(in_rx, out_tx);

        let units = collect(out_rx);
        assert_eq!(units[0].generation, 3);
    }

    fn stamped(millis: u64, generation: u64, payload: u8) -> Packet {
        let mut packet = Packet::new(TrackId(0), Duration::from_millis(millis), vec![payload]);
        packet.generation = generation;
        packet
    }

    #[test]
    fn seek_drops_frames_buffered_before_it() {
        let (in_tx, in_rx) = mpsc::channel(8);
        in_tx.try_send(stamped(8_000, 0, 0)).unwrap();
        for millis in [3_000, 3_040, 3_080] {
            in_tx.try_send(stamped(millis, 1, 0)).unwrap();
        }
        drop(in_tx);

        let stats = Arc::new(DecodeStats::default());
        let (out_tx, out_rx) = mpsc::channel(8);
        TrackDecoder::new("video", Box::new(FlakyCodec { held: None }), Arc::clone(&stats))
            .run(in_rx, out_tx);

        let units: Vec<(u64, u64)> = collect(out_rx)
            .iter()
            .map(|d| (d.generation, d.unit.timecode.as_millis() as u64))
            .collect();
        assert_eq!(units, vec![(1, 3_000), (1, 3_040), (1, 3_080)]);
        assert_eq!(stats.snapshot().resets, 1);
    }

    #[test]
    fn unrecoverable_error_drains_the_rest() {
        let (in_tx, in_rx) = mpsc::channel(8);
        for (millis, payload) in [(0, 0x00), (40, 0x00), (80, 0xEE), (120, 0x00), (160, 0x00)] {
            in_tx.try_send(stamped(millis, 0, payload)).unwrap();
        }
        drop(in_tx);

        let stats = Arc::new(DecodeStats::default());
        let (out_tx, out_rx) = mpsc::channel(8);
        TrackDecoder::new("video", Box::new(FlakyCodec { held: None }), Arc::clone(&stats))
            .run(in_rx, out_tx);

        // Only the frame released by the second packet; no flush afterwards.
        assert_eq!(collect(out_rx).len(), 1);
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.errors, 1);
        assert_eq!(snapshot.discarded, 2);
    }

    #[test]
    fn draining_decoder_discards_everything() {
        let stats = Arc::new(DecodeStats::default());
        let (out_tx, out_rx) = mpsc::channel::<Decoded<VideoFrame>>(8);
        TrackDecoder::draining("audio", Arc::clone(&stats)).run(packets(12, None), out_tx);

        assert!(collect(out_rx).is_empty());
        assert_eq!(stats.snapshot().discarded, 12);
        assert_eq!(stats.snapshot().decoded, 0);
    }

    #[test]
    fn stops_when_consumer_is_gone() {
        let stats = Arc::new(DecodeStats::default());
        let (out_tx, out_rx) = mpsc::channel(1);
        drop(out_rx);
        TrackDecoder::new("video", Box::new(FlakyCodec { held: None }), Arc::clone(&stats))
            .run(packets(10, None), out_tx);
        // The first unit fails to send; nothing else is decoded.
        assert_eq!(stats.snapshot().decoded, 1);
    }
}

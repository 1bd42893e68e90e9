// SPDX-License-Identifier: MPL-2.0
//! Source reader stage: pulls packets out of a [`PacketSource`].
//!
//! Runs on a blocking thread. Between two packets it applies pending seek
//! requests and checks the shutdown signal, so a seek takes effect on the
//! next read and teardown never waits for the end of the file. At end of
//! input the packet queue is closed and the source is dropped, releasing the
//! container. Recoverable read errors are skipped up to a limit; any other
//! error ends the input at once.

use crate::application::port::PacketSource;
use crate::domain::media::Packet;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Consecutive read failures after which the input is treated as exhausted.
pub const MAX_CONSECUTIVE_READ_ERRORS: u32 = 16;

/// One seek delivered to one reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeekRequest {
    pub target: Duration,
    pub generation: u64,
}

pub struct SourceReader {
    label: String,
    source: Box<dyn PacketSource>,
    seeks: mpsc::UnboundedReceiver<SeekRequest>,
    shutdown: watch::Receiver<bool>,
}

impl SourceReader {
    #[must_use]
    pub fn new(
        label: impl Into<String>,
        source: Box<dyn PacketSource>,
        seeks: mpsc::UnboundedReceiver<SeekRequest>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            label: label.into(),
            source,
            seeks,
            shutdown,
        }
    }

    pub fn spawn(self, output: mpsc::Sender<Packet>) -> JoinHandle<()> {
        tokio::task::spawn_blocking(move || self.run(output))
    }

    /// Reads until end of input, shutdown, or until nobody consumes packets.
    ///
    /// Blocks the calling thread: never call it from an async context.
    pub fn run(mut self, output: mpsc::Sender<Packet>) {
        let mut generation = 0;
        let mut consecutive_errors = 0;
        let mut read = 0u64;

        loop {
            if *self.shutdown.borrow() {
                tracing::debug!(input = %self.label, "reader stopping on shutdown");
                break;
            }

            while let Ok(request) = self.seeks.try_recv() {
                match self.source.seek(request.target) {
                    Ok(()) => {
                        generation = request.generation;
                        tracing::info!(
                            input = %self.label,
                            target_ms = request.target.as_millis(),
                            "source repositioned"
                        );
                    }
                    Err(err) => {
                        tracing::warn!(input = %self.label, error = %err, "seek failed");
                    }
                }
            }

            match self.source.read_packet() {
                Ok(Some(mut packet)) => {
                    consecutive_errors = 0;
                    read += 1;
                    packet.generation = generation;
                    if output.blocking_send(packet).is_err() {
                        tracing::debug!(input = %self.label, "packet consumer gone");
                        break;
                    }
                }
                Ok(None) => {
                    tracing::info!(input = %self.label, packets = read, "end of input");
                    break;
                }
                Err(err) if !err.is_recoverable() => {
                    tracing::error!(input = %self.label, error = %err, "input unreadable");
                    break;
                }
                Err(err) => {
                    consecutive_errors += 1;
                    tracing::warn!(input = %self.label, error = %err, "packet read failed");
                    if consecutive_errors >= MAX_CONSECUTIVE_READ_ERRORS {
                        tracing::warn!(input = %self.label, "giving up on unreadable input");
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::media::{TrackId, TrackMeta};
    use crate::error::{Error, Result};

    struct ScriptedSource {
        tracks: Vec<TrackMeta>,
        timecodes: Vec<u64>,
        cursor: usize,
        fail_every_read: bool,
        reads: usize,
        /// Read index returning a terminal error.
        broken_at: Option<usize>,
    }

    impl ScriptedSource {
        fn new(timecodes: Vec<u64>) -> Self {
            Self {
                tracks: vec![TrackMeta::video(TrackId(0), "mock", None)],
                timecodes,
                cursor: 0,
                fail_every_read: false,
                reads: 0,
                broken_at: None,
            }
        }
    }

    impl PacketSource for ScriptedSource {
        fn tracks(&self) -> &[TrackMeta] {
            &self.tracks
        }

        fn duration(&self) -> Option<Duration> {
            None
        }

        fn read_packet(&mut self) -> Result<Option<Packet>> {
            self.reads += 1;
            if self.broken_at == Some(self.reads - 1) {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "file truncated",
                )));
            }
            if self.fail_every_read {
                return Err(Error::Source("bad cluster".into()));
            }
            let packet = self.timecodes.get(self.cursor).map(|millis| {
                Packet::new(TrackId(0), Duration::from_millis(*millis), vec![0])
            });
            self.cursor += 1;
            Ok(packet)
        }

        fn seek(&mut self, target: Duration) -> Result<()> {
            self.cursor = self
                .timecodes
                .iter()
                .position(|millis| Duration::from_millis(*millis) >= target)
                .unwrap_or(self.timecodes.len());
            Ok(())
        }
    }

    fn drain(mut rx: mpsc::Receiver<Packet>) -> Vec<Packet> {
        let mut out = Vec::new();
        while let Ok(packet) = rx.try_recv() {
            out.push(packet);
        }
        out
    }

    #[test]
    fn reads_every_packet_then_closes() {
        let (_seek_tx, seek_rx) = mpsc::unbounded_channel();
        let (_stop_tx, stop_rx) = watch::channel(false);
        let (tx, rx) = mpsc::channel(16);

        let source = ScriptedSource::new(vec![0, 40, 80]);
        SourceReader::new("test", Box::new(source), seek_rx, stop_rx).run(tx);

        let packets = drain(rx);
        assert_eq!(packets.len(), 3);
        assert!(packets.iter().all(|p| p.generation == 0));
    }

    #[test]
    fn pending_seek_is_applied_and_stamped() {
        let (seek_tx, seek_rx) = mpsc::unbounded_channel();
        let (_stop_tx, stop_rx) = watch::channel(false);
        let (tx, rx) = mpsc::channel(16);
        seek_tx
            .send(SeekRequest {
                target: Duration::from_millis(80),
                generation: 2,
            })
            .unwrap();

        let source = ScriptedSource::new(vec![0, 40, 80, 120]);
        SourceReader::new("test", Box::new(source), seek_rx, stop_rx).run(tx);

        let packets = drain(rx);
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].timecode, Duration::from_millis(80));
        assert!(packets.iter().all(|p| p.generation == 2));
    }

    #[test]
    fn shutdown_stops_before_reading() {
        let (_seek_tx, seek_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = watch::channel(false);
        stop_tx.send(true).unwrap();
        let (tx, rx) = mpsc::channel(16);

        let source = ScriptedSource::new(vec![0, 40, 80]);
        SourceReader::new("test", Box::new(source), seek_rx, stop_rx).run(tx);
        assert!(drain(rx).is_empty());
    }

    #[test]
    fn persistent_read_errors_end_the_input() {
        let (_seek_tx, seek_rx) = mpsc::unbounded_channel();
        let (_stop_tx, stop_rx) = watch::channel(false);
        let (tx, mut rx) = mpsc::channel(16);

        let mut source = ScriptedSource::new(vec![0]);
        source.fail_every_read = true;
        SourceReader::new("test", Box::new(source), seek_rx, stop_rx).run(tx);

        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn terminal_read_error_ends_the_input_at_once() {
        let (_seek_tx, seek_rx) = mpsc::unbounded_channel();
        let (_stop_tx, stop_rx) = watch::channel(false);
        let (tx, rx) = mpsc::channel(16);

        let mut source = ScriptedSource::new(vec![0, 40, 80, 120]);
        source.broken_at = Some(2);
        SourceReader::new("test", Box::new(source), seek_rx, stop_rx).run(tx);

        let packets = drain(rx);
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[1].timecode, Duration::from_millis(40));
    }
}

// SPDX-License-Identifier: MPL-2.0
//! Rebase events and the bus that carries them to every sync engine.
//!
//! Seeks are broadcast: every engine and the audio feeder subscribe. Drift
//! corrections flow point to point from the clock master to the one engine
//! that follows it, so they travel on a plain bounded queue.

use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;

/// Seek events retained for a subscriber that is not listening right now.
const SEEK_BACKLOG: usize = 16;

/// Correction ticks buffered for the following engine. Older ticks are
/// worthless, so senders drop rather than wait when the queue is full.
pub const CORRECTION_BACKLOG: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebaseOrigin {
    /// User seek: always applied, abandons the pending unit.
    Seek,
    /// Position reported by the clock master: applied above the tolerance.
    Correction,
}

/// Atomic replacement of a clock's epoch: timecode `target` corresponds to
/// the monotonic instant `at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rebase {
    pub target: Duration,
    pub at: Instant,
    pub origin: RebaseOrigin,
    /// For seeks, the new seek generation. For corrections, the generation
    /// of the content the master was playing.
    pub generation: u64,
}

impl Rebase {
    #[must_use]
    pub fn seek(target: Duration, generation: u64) -> Self {
        Self {
            target,
            at: Instant::now(),
            origin: RebaseOrigin::Seek,
            generation,
        }
    }

    #[must_use]
    pub fn correction(target: Duration, at: Instant, generation: u64) -> Self {
        Self {
            target,
            at,
            origin: RebaseOrigin::Correction,
            generation,
        }
    }

    #[must_use]
    pub fn is_seek(&self) -> bool {
        self.origin == RebaseOrigin::Seek
    }
}

/// Broadcast side of the seek channel.
#[derive(Debug, Clone)]
pub struct RebaseBus {
    seeks: broadcast::Sender<Rebase>,
}

impl Default for RebaseBus {
    fn default() -> Self {
        Self::new()
    }
}

impl RebaseBus {
    #[must_use]
    pub fn new() -> Self {
        let (seeks, _) = broadcast::channel(SEEK_BACKLOG);
        Self { seeks }
    }

    /// Delivers a seek rebase to every current subscriber.
    pub fn publish(&self, rebase: Rebase) {
        // No subscriber simply means nothing is playing yet.
        let _ = self.seeks.send(rebase);
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Rebase> {
        self.seeks.subscribe()
    }

    /// Creates the listener an engine waits on. `corrections` is given only
    /// to the engine that follows the clock master.
    #[must_use]
    pub fn listener(&self, corrections: Option<mpsc::Receiver<Rebase>>) -> RebaseListener {
        RebaseListener {
            seeks: Some(self.subscribe()),
            corrections,
        }
    }
}

/// Receiving side used by one sync engine.
///
/// [`next`](Self::next) is cancel-safe, so it can sit in a `tokio::select!`
/// next to the engine's other futures.
#[derive(Debug)]
pub struct RebaseListener {
    seeks: Option<broadcast::Receiver<Rebase>>,
    corrections: Option<mpsc::Receiver<Rebase>>,
}

enum Incoming {
    Seek(Result<Rebase, broadcast::error::RecvError>),
    Correction(Option<Rebase>),
}

impl RebaseListener {
    /// Listener that never yields, for engines driven without a bus.
    #[must_use]
    pub fn detached() -> Self {
        Self {
            seeks: None,
            corrections: None,
        }
    }

    /// Waits for the next rebase. Pends forever once every source is closed.
    pub async fn next(&mut self) -> Rebase {
        loop {
            if self.seeks.is_none() && self.corrections.is_none() {
                return std::future::pending().await;
            }

            let incoming = {
                let seeks = &mut self.seeks;
                let corrections = &mut self.corrections;
                tokio::select! {
                    biased;
                    seek = recv_seek(seeks), if seeks.is_some() => Incoming::Seek(seek),
                    tick = recv_correction(corrections), if corrections.is_some() => {
                        Incoming::Correction(tick)
                    }
                }
            };

            match incoming {
                Incoming::Seek(Ok(rebase)) | Incoming::Correction(Some(rebase)) => return rebase,
                Incoming::Seek(Err(broadcast::error::RecvError::Lagged(skipped))) => {
                    // Units of the skipped seeks resync their engine on arrival.
                    tracing::warn!(skipped, "seek listener lagged");
                }
                Incoming::Seek(Err(broadcast::error::RecvError::Closed)) => self.seeks = None,
                Incoming::Correction(None) => self.corrections = None,
            }
        }
    }
}

async fn recv_seek(
    seeks: &mut Option<broadcast::Receiver<Rebase>>,
) -> Result<Rebase, broadcast::error::RecvError> {
    match seeks {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn recv_correction(corrections: &mut Option<mpsc::Receiver<Rebase>>) -> Option<Rebase> {
    match corrections {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Rate-limited sender of correction ticks, owned by the clock master.
///
/// Never blocks: a full queue drops the tick. Safe to call from the audio
/// device callback.
#[derive(Debug)]
pub struct TickReporter {
    ticks: mpsc::Sender<Rebase>,
    interval: Duration,
    last: Option<Instant>,
}

impl TickReporter {
    #[must_use]
    pub fn new(ticks: mpsc::Sender<Rebase>, interval: Duration) -> Self {
        Self {
            ticks,
            interval,
            last: None,
        }
    }

    /// Reports that `position` is being played at `now`. Returns true when a
    /// tick was queued.
    pub fn report(&mut self, position: Duration, generation: u64, now: Instant) -> bool {
        if let Some(last) = self.last {
            if now.saturating_duration_since(last) < self.interval {
                return false;
            }
        }
        if self
            .ticks
            .try_send(Rebase::correction(position, now, generation))
            .is_ok()
        {
            self.last = Some(now);
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn listener_receives_seeks_and_corrections() {
        let bus = RebaseBus::new();
        let (tick_tx, tick_rx) = mpsc::channel(CORRECTION_BACKLOG);
        let mut listener = bus.listener(Some(tick_rx));

        bus.publish(Rebase::seek(Duration::from_secs(5), 1));
        let seek = listener.next().await;
        assert!(seek.is_seek());
        assert_eq!(seek.target, Duration::from_secs(5));

        let now = Instant::now();
        tick_tx
            .send(Rebase::correction(Duration::from_secs(6), now, 1))
            .await
            .unwrap();
        let tick = listener.next().await;
        assert_eq!(tick.origin, RebaseOrigin::Correction);
    }

    #[tokio::test(start_paused = true)]
    async fn listener_pends_once_all_sources_close() {
        let bus = RebaseBus::new();
        let (tick_tx, tick_rx) = mpsc::channel(CORRECTION_BACKLOG);
        let mut listener = bus.listener(Some(tick_rx));
        drop(tick_tx);
        drop(bus);

        let waited = tokio::time::timeout(Duration::from_secs(1), listener.next()).await;
        assert!(waited.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn detached_listener_never_yields() {
        let mut listener = RebaseListener::detached();
        let waited = tokio::time::timeout(Duration::from_millis(50), listener.next()).await;
        assert!(waited.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn tick_reporter_rate_limits() {
        let (tick_tx, mut tick_rx) = mpsc::channel(CORRECTION_BACKLOG);
        let mut reporter = TickReporter::new(tick_tx, Duration::from_millis(250));
        let start = Instant::now();

        assert!(reporter.report(Duration::ZERO, 0, start));
        assert!(!reporter.report(
            Duration::from_millis(100),
            0,
            start + Duration::from_millis(100)
        ));
        assert!(reporter.report(
            Duration::from_millis(300),
            0,
            start + Duration::from_millis(300)
        ));

        assert_eq!(tick_rx.recv().await.unwrap().target, Duration::ZERO);
        assert_eq!(
            tick_rx.recv().await.unwrap().target,
            Duration::from_millis(300)
        );
    }

    #[tokio::test]
    async fn tick_reporter_drops_when_full() {
        let (tick_tx, _tick_rx) = mpsc::channel(1);
        let mut reporter = TickReporter::new(tick_tx, Duration::ZERO);
        let now = Instant::now();
        assert!(reporter.report(Duration::ZERO, 0, now));
        assert!(!reporter.report(Duration::from_millis(10), 0, now));
    }
}

// SPDX-License-Identifier: MPL-2.0
//! Sync engine: releases decoded units at their presentation time.
//!
//! One engine runs per stream as an async task between the track decoder
//! and the presenter handoff queue:
//!
//! ```text
//! decoded units ──▶ SyncEngine ──▶ handoff (bounded) ──▶ presenter / device
//!                      ▲
//!                      └── rebase listener (seeks, corrections) + shutdown
//! ```
//!
//! For each unit the engine asks its [`ClockState`] for a [`Decision`] and
//! either emits, waits (interruptibly) or drops. Every suspension point also
//! listens for rebases and for shutdown, so the engine never blocks teardown.

use crate::domain::media::Timed;
use crate::playback::decoder::Decoded;
use crate::playback::presenter::PlaybackPosition;
use crate::playback::rebase::{Rebase, RebaseListener, RebaseOrigin, TickReporter};
use crate::playback::stats::SyncStats;
use crate::playback::sync::{ClockState, Decision, RebaseEffect};
use crate::playback::wait::{shutdown_requested, wait_interruptible, WaitOutcome};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// What happened to a unit handed to the output queue.
enum Delivery {
    Delivered,
    /// A seek arrived while the queue was full; the unit is pre-seek.
    Superseded,
    Closed,
    Shutdown,
}

/// Per-stream sync engine.
pub struct SyncEngine {
    label: &'static str,
    clock: ClockState,
    listener: RebaseListener,
    shutdown: watch::Receiver<bool>,
    stats: Arc<SyncStats>,
    position: Option<PlaybackPosition>,
    ticks: Option<TickReporter>,
}

impl SyncEngine {
    #[must_use]
    pub fn new(
        label: &'static str,
        clock: ClockState,
        listener: RebaseListener,
        shutdown: watch::Receiver<bool>,
        stats: Arc<SyncStats>,
    ) -> Self {
        Self {
            label,
            clock,
            listener,
            shutdown,
            stats,
            position: None,
            ticks: None,
        }
    }

    /// Makes this engine the writer of the shared playback position.
    #[must_use]
    pub fn with_position(mut self, position: PlaybackPosition) -> Self {
        self.position = Some(position);
        self
    }

    /// Makes this engine the clock master: emitted timecodes are reported
    /// as correction ticks.
    #[must_use]
    pub fn with_ticks(mut self, ticks: TickReporter) -> Self {
        self.ticks = Some(ticks);
        self
    }

    /// Spawns the engine on the runtime.
    pub fn spawn<U>(
        self,
        input: mpsc::Receiver<Decoded<U>>,
        output: mpsc::Sender<Decoded<U>>,
    ) -> JoinHandle<()>
    where
        U: Timed + Send + 'static,
    {
        tokio::spawn(self.run(input, output))
    }

    /// Runs until the input closes, the output's consumer goes away or
    /// shutdown is signalled. Dropping `output` on return closes the handoff.
    pub async fn run<U: Timed>(
        mut self,
        mut input: mpsc::Receiver<Decoded<U>>,
        output: mpsc::Sender<Decoded<U>>,
    ) {
        tracing::debug!(track = self.label, "sync engine started");

        'units: loop {
            let next = tokio::select! {
                biased;
                () = shutdown_requested(&mut self.shutdown) => break 'units,
                rebase = self.listener.next() => {
                    self.hold(rebase);
                    continue 'units;
                }
                unit = input.recv() => unit,
            };
            let Some(decoded) = next else {
                tracing::debug!(track = self.label, "decoded queue closed");
                break;
            };

            self.apply_pending();

            if self.clock.is_superseded(decoded.generation) {
                self.stats.record_superseded();
                tracing::debug!(
                    track = self.label,
                    timecode_ms = decoded.unit.timecode().as_millis(),
                    "dropping unit from before seek"
                );
                continue;
            }

            let timecode = decoded.unit.timecode();
            if self.clock.is_ahead(decoded.generation) {
                self.resync(timecode, decoded.generation);
            }

            loop {
                match self.clock.schedule(timecode, Instant::now()) {
                    Decision::EmitNow => {
                        match self.deliver(&output, decoded).await {
                            Delivery::Delivered => self.emitted(timecode),
                            Delivery::Superseded => self.stats.record_superseded(),
                            Delivery::Closed => {
                                tracing::debug!(track = self.label, "handoff consumer gone");
                                break 'units;
                            }
                            Delivery::Shutdown => break 'units,
                        }
                        continue 'units;
                    }
                    Decision::Wait(lead) => {
                        match wait_interruptible(lead, &mut self.listener, &mut self.shutdown)
                            .await
                        {
                            WaitOutcome::Elapsed => {}
                            WaitOutcome::Rebased(rebase) => {
                                let is_seek = rebase.is_seek();
                                self.apply(rebase);
                                if is_seek {
                                    self.stats.record_abandoned_wait();
                                    tracing::debug!(
                                        track = self.label,
                                        timecode_ms = timecode.as_millis(),
                                        "wait abandoned on seek"
                                    );
                                    continue 'units;
                                }
                            }
                            WaitOutcome::Shutdown => break 'units,
                        }
                    }
                    Decision::DropLate { behind } => {
                        self.stats.record_dropped_late();
                        tracing::debug!(
                            track = self.label,
                            timecode_ms = timecode.as_millis(),
                            behind_ms = behind.as_millis(),
                            "dropping late unit"
                        );
                        continue 'units;
                    }
                    Decision::DropEarly { ahead } => {
                        self.stats.record_dropped_early();
                        tracing::debug!(
                            track = self.label,
                            timecode_ms = timecode.as_millis(),
                            ahead_ms = ahead.as_millis(),
                            "dropping unit too far ahead"
                        );
                        continue 'units;
                    }
                }
            }
        }

        tracing::debug!(track = self.label, "sync engine stopped");
    }

    /// Keeps `rebase` for the next decision. A seek target is published as
    /// the playback position right away.
    fn hold(&mut self, rebase: Rebase) {
        if rebase.is_seek() {
            if let Some(position) = &self.position {
                position.set(rebase.target);
            }
        }
        self.clock.hold(rebase);
    }

    fn apply_pending(&mut self) {
        if let Some(rebase) = self.clock.take_pending() {
            self.apply(rebase);
        }
    }

    fn apply(&mut self, rebase: Rebase) {
        if self.clock.apply(rebase) == RebaseEffect::Ignored {
            return;
        }
        match rebase.origin {
            RebaseOrigin::Seek => {
                self.stats.record_seek();
                if let Some(position) = &self.position {
                    position.set(rebase.target);
                }
                tracing::debug!(
                    track = self.label,
                    target_ms = rebase.target.as_millis(),
                    generation = rebase.generation,
                    "clock rebased on seek"
                );
            }
            RebaseOrigin::Correction => {
                self.stats.record_correction();
                tracing::debug!(
                    track = self.label,
                    target_ms = rebase.target.as_millis(),
                    "clock corrected"
                );
            }
        }
    }

    /// Adopts a seek this engine missed: the unit that carries it becomes
    /// the new epoch.
    fn resync(&mut self, timecode: Duration, generation: u64) {
        self.stats.record_resync();
        tracing::warn!(
            track = self.label,
            timecode_ms = timecode.as_millis(),
            generation,
            "unit from an unseen seek, resyncing on it"
        );
        self.clock.apply(Rebase::seek(timecode, generation));
        if let Some(position) = &self.position {
            position.set(timecode);
        }
    }

    fn emitted(&mut self, timecode: Duration) {
        self.stats.record_emitted();
        if let Some(position) = &self.position {
            position.set(timecode);
        }
        if let Some(ticks) = &mut self.ticks {
            ticks.report(timecode, self.clock.generation(), Instant::now());
        }
        tracing::trace!(
            track = self.label,
            timecode_ms = timecode.as_millis(),
            "unit emitted"
        );
    }

    /// Waits for room in the output queue while still honoring rebases and
    /// shutdown.
    async fn deliver<U>(
        &mut self,
        output: &mpsc::Sender<Decoded<U>>,
        decoded: Decoded<U>,
    ) -> Delivery {
        loop {
            tokio::select! {
                biased;
                () = shutdown_requested(&mut self.shutdown) => return Delivery::Shutdown,
                rebase = self.listener.next() => {
                    let is_seek = rebase.is_seek();
                    self.hold(rebase);
                    if is_seek {
                        return Delivery::Superseded;
                    }
                }
                permit = output.reserve() => {
                    return match permit {
                        Ok(permit) => {
                            permit.send(decoded);
                            Delivery::Delivered
                        }
                        Err(_) => Delivery::Closed,
                    };
                }
            }
        }
    }
}

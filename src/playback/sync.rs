// SPDX-License-Identifier: MPL-2.0
//! Per-stream clock and the schedule decision for decoded units.
//!
//! Each sync engine owns one [`ClockState`]. The clock maps timecodes onto
//! the monotonic clock through an [`Epoch`]: "this instant corresponds to
//! this timecode". Scheduling a unit compares its timecode with the clock's
//! current position:
//!
//! ```text
//!            stale_past          now           stale_future
//!   ──DropLate──┼────EmitNow──────┼────Wait(lead)────┼──DropEarly──▶ timecode
//! ```
//!
//! The epoch is created lazily by the first unit, so that unit is due
//! immediately. Rebases replace it atomically.

use crate::playback::rebase::{Rebase, RebaseOrigin};
use std::time::Duration;
use tokio::time::Instant;

/// Anchor pair mapping a monotonic instant to a timecode.
///
/// Stored as a pair instead of `now - timecode` so large timecodes never
/// underflow the monotonic clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Epoch {
    anchor: Instant,
    timecode: Duration,
}

impl Epoch {
    #[must_use]
    pub fn new(anchor: Instant, timecode: Duration) -> Self {
        Self { anchor, timecode }
    }

    /// Timecode being played at `now`.
    #[must_use]
    pub fn position(&self, now: Instant) -> Duration {
        if now >= self.anchor {
            self.timecode + (now - self.anchor)
        } else {
            self.timecode.saturating_sub(self.anchor - now)
        }
    }
}

/// Staleness bounds of one stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    /// Lateness beyond which a unit is dropped.
    pub stale_past: Duration,
    /// Lead beyond which a unit is treated as bogus and dropped.
    pub stale_future: Duration,
    /// Drift below which a correction rebase is ignored.
    pub correction_tolerance: Duration,
}

impl Default for Thresholds {
    fn default() -> Self {
        use crate::config::{
            DEFAULT_CORRECTION_TOLERANCE_MS, DEFAULT_STALE_FUTURE_MS, DEFAULT_VIDEO_STALE_PAST_MS,
        };
        Self {
            stale_past: Duration::from_millis(DEFAULT_VIDEO_STALE_PAST_MS),
            stale_future: Duration::from_millis(DEFAULT_STALE_FUTURE_MS),
            correction_tolerance: Duration::from_millis(DEFAULT_CORRECTION_TOLERANCE_MS),
        }
    }
}

/// Outcome of scheduling one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The unit is due: emit it now.
    EmitNow,
    /// The unit is early: wait this long, then emit it.
    Wait(Duration),
    /// The unit is later than `stale_past`.
    DropLate { behind: Duration },
    /// The unit is further ahead than `stale_future`.
    DropEarly { ahead: Duration },
}

/// Effect of offering a rebase to the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebaseEffect {
    Applied,
    /// Correction within tolerance or from another seek generation.
    Ignored,
}

/// Clock of one stream: its epoch, the rebase held for the next decision and
/// the seek generation currently playing.
#[derive(Debug, Clone)]
pub struct ClockState {
    epoch: Option<Epoch>,
    pending: Option<Rebase>,
    generation: u64,
    thresholds: Thresholds,
}

impl ClockState {
    #[must_use]
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            epoch: None,
            pending: None,
            generation: 0,
            thresholds,
        }
    }

    #[must_use]
    pub fn epoch(&self) -> Option<Epoch> {
        self.epoch
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    /// Current position, or `None` before the first unit.
    #[must_use]
    pub fn position(&self, now: Instant) -> Option<Duration> {
        self.epoch.map(|epoch| epoch.position(now))
    }

    /// Returns true when a unit belongs to a seek generation this clock has
    /// already moved past.
    #[must_use]
    pub fn is_superseded(&self, generation: u64) -> bool {
        generation < self.generation
    }

    /// Returns true when a unit belongs to a seek this clock never saw,
    /// which happens when its listener lagged behind the seek broadcast.
    #[must_use]
    pub fn is_ahead(&self, generation: u64) -> bool {
        generation > self.generation
    }

    /// Decides what to do with a unit stamped `timecode`.
    pub fn schedule(&mut self, timecode: Duration, now: Instant) -> Decision {
        let position = self
            .epoch
            .get_or_insert_with(|| Epoch::new(now, timecode))
            .position(now);

        if timecode > position {
            let lead = timecode - position;
            if lead > self.thresholds.stale_future {
                Decision::DropEarly { ahead: lead }
            } else {
                Decision::Wait(lead)
            }
        } else {
            let behind = position - timecode;
            if behind > self.thresholds.stale_past {
                Decision::DropLate { behind }
            } else {
                Decision::EmitNow
            }
        }
    }

    /// Applies a rebase immediately.
    pub fn apply(&mut self, rebase: Rebase) -> RebaseEffect {
        match rebase.origin {
            RebaseOrigin::Seek => {
                self.epoch = Some(Epoch::new(rebase.at, rebase.target));
                self.generation = self.generation.max(rebase.generation);
                RebaseEffect::Applied
            }
            RebaseOrigin::Correction => {
                if rebase.generation != self.generation {
                    return RebaseEffect::Ignored;
                }
                let drift = self
                    .position(rebase.at)
                    .map(|position| position.abs_diff(rebase.target));
                match drift {
                    Some(drift) if drift <= self.thresholds.correction_tolerance => {
                        RebaseEffect::Ignored
                    }
                    _ => {
                        self.epoch = Some(Epoch::new(rebase.at, rebase.target));
                        RebaseEffect::Applied
                    }
                }
            }
        }
    }

    /// Holds a rebase for the next decision. The latest wins, except that a
    /// held seek is never replaced by a correction.
    pub fn hold(&mut self, rebase: Rebase) {
        let keep_held = matches!(
            (self.pending.as_ref().map(|held| held.origin), rebase.origin),
            (Some(RebaseOrigin::Seek), RebaseOrigin::Correction)
        );
        if !keep_held {
            self.pending = Some(rebase);
        }
    }

    /// Takes the held rebase, if any.
    pub fn take_pending(&mut self) -> Option<Rebase> {
        self.pending.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    fn clock() -> ClockState {
        ClockState::new(Thresholds {
            stale_past: ms(1_000),
            stale_future: ms(10_000),
            correction_tolerance: ms(40),
        })
    }

    #[test]
    fn first_unit_is_due_immediately() {
        let mut clock = clock();
        let now = Instant::now();
        assert_eq!(clock.schedule(ms(7_000), now), Decision::EmitNow);
        assert_eq!(clock.position(now), Some(ms(7_000)));
    }

    #[test]
    fn early_unit_waits_for_its_lead() {
        let mut clock = clock();
        let now = Instant::now();
        clock.schedule(Duration::ZERO, now);
        assert_eq!(clock.schedule(ms(33), now), Decision::Wait(ms(33)));
        assert_eq!(clock.schedule(ms(33), now + ms(33)), Decision::EmitNow);
    }

    #[test]
    fn late_unit_within_tolerance_is_emitted() {
        let mut clock = clock();
        let now = Instant::now();
        clock.schedule(Duration::ZERO, now);
        assert_eq!(clock.schedule(ms(100), now + ms(900)), Decision::EmitNow);
    }

    #[test]
    fn stale_units_are_dropped() {
        let mut clock = clock();
        let now = Instant::now();
        clock.schedule(ms(5_000), now);

        assert_eq!(
            clock.schedule(ms(5_500), now + ms(2_000)),
            Decision::DropLate { behind: ms(1_500) }
        );
        assert_eq!(
            clock.schedule(ms(20_000), now),
            Decision::DropEarly { ahead: ms(15_000) }
        );
    }

    #[test]
    fn seek_replaces_epoch_and_generation() {
        let mut clock = clock();
        let now = Instant::now();
        clock.schedule(Duration::ZERO, now);

        let seek = Rebase::seek(ms(5_000), 1);
        assert_eq!(clock.apply(seek), RebaseEffect::Applied);
        assert_eq!(clock.generation(), 1);
        assert!(clock.is_superseded(0));
        assert_eq!(clock.position(seek.at), Some(ms(5_000)));
    }

    #[test]
    fn repeated_seek_is_idempotent() {
        let mut clock = clock();
        let seek = Rebase::seek(ms(5_000), 1);
        clock.apply(seek);
        let first = clock.position(seek.at + ms(100));
        clock.apply(seek);
        let second = clock.position(seek.at + ms(100));

        let (Some(first), Some(second)) = (first, second) else {
            panic!("epoch missing after seek");
        };
        assert!(first.abs_diff(second) <= ms(5));
    }

    #[test]
    fn corrections_within_tolerance_are_ignored() {
        let mut clock = clock();
        let now = Instant::now();
        clock.schedule(Duration::ZERO, now);

        let small = Rebase::correction(ms(120), now + ms(100), 0);
        assert_eq!(clock.apply(small), RebaseEffect::Ignored);

        let large = Rebase::correction(ms(600), now + ms(100), 0);
        assert_eq!(clock.apply(large), RebaseEffect::Applied);
        assert_eq!(clock.position(now + ms(100)), Some(ms(600)));
    }

    #[test]
    fn correction_without_epoch_is_applied() {
        let mut clock = clock();
        let now = Instant::now();
        let tick = Rebase::correction(ms(2_000), now, 0);
        assert_eq!(clock.apply(tick), RebaseEffect::Applied);
        assert_eq!(clock.schedule(ms(2_000), now), Decision::EmitNow);
    }

    #[test]
    fn correction_from_other_generation_is_ignored() {
        let mut clock = clock();
        let now = Instant::now();
        clock.apply(Rebase::seek(ms(3_000), 2));
        let stale_tick = Rebase::correction(ms(9_000), now, 1);
        assert_eq!(clock.apply(stale_tick), RebaseEffect::Ignored);
    }

    #[test]
    fn held_seek_beats_later_correction() {
        let mut clock = clock();
        let now = Instant::now();
        clock.hold(Rebase::correction(ms(100), now, 0));
        clock.hold(Rebase::seek(ms(4_000), 1));
        clock.hold(Rebase::correction(ms(200), now, 0));

        let held = clock.take_pending().unwrap();
        assert!(held.is_seek());
        assert_eq!(held.target, ms(4_000));
        assert!(clock.take_pending().is_none());
    }

    #[test]
    fn latest_held_seek_wins() {
        let mut clock = clock();
        clock.hold(Rebase::seek(ms(1_000), 1));
        clock.hold(Rebase::seek(ms(8_000), 2));
        assert_eq!(clock.take_pending().unwrap().target, ms(8_000));
    }

    #[test]
    fn generations_are_compared_both_ways() {
        let mut clock = clock();
        clock.apply(Rebase::seek(ms(1_000), 2));
        assert!(clock.is_superseded(1));
        assert!(!clock.is_superseded(2));
        assert!(!clock.is_ahead(2));
        assert!(clock.is_ahead(3));
    }

    #[test]
    fn epoch_position_before_anchor_saturates() {
        let now = Instant::now();
        let epoch = Epoch::new(now + ms(500), ms(200));
        assert_eq!(epoch.position(now), Duration::ZERO);
        assert_eq!(epoch.position(now + ms(400)), ms(100));
    }
}

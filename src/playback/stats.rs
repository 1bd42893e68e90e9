// SPDX-License-Identifier: MPL-2.0
//! Lock-free counters kept by the pipeline stages.
//!
//! Each stage owns an `Arc` of its counters and bumps them with relaxed
//! atomics. Readers take a [`snapshot`](SyncStats::snapshot) for logging or
//! assertions.

use std::sync::atomic::{AtomicU64, Ordering};

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

fn read(counter: &AtomicU64) -> u64 {
    counter.load(Ordering::Relaxed)
}

/// Counters of one sync engine.
#[derive(Debug, Default)]
pub struct SyncStats {
    emitted: AtomicU64,
    dropped_late: AtomicU64,
    dropped_early: AtomicU64,
    superseded: AtomicU64,
    seeks: AtomicU64,
    corrections: AtomicU64,
    abandoned_waits: AtomicU64,
    resyncs: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSnapshot {
    pub emitted: u64,
    pub dropped_late: u64,
    pub dropped_early: u64,
    /// Units from before the latest seek, discarded unseen.
    pub superseded: u64,
    pub seeks: u64,
    pub corrections: u64,
    pub abandoned_waits: u64,
    /// Units from a seek the engine never heard about, adopted as a rebase.
    pub resyncs: u64,
}

impl SyncStats {
    pub(crate) fn record_emitted(&self) {
        bump(&self.emitted);
    }

    pub(crate) fn record_dropped_late(&self) {
        bump(&self.dropped_late);
    }

    pub(crate) fn record_dropped_early(&self) {
        bump(&self.dropped_early);
    }

    pub(crate) fn record_superseded(&self) {
        bump(&self.superseded);
    }

    pub(crate) fn record_seek(&self) {
        bump(&self.seeks);
    }

    pub(crate) fn record_correction(&self) {
        bump(&self.corrections);
    }

    pub(crate) fn record_abandoned_wait(&self) {
        bump(&self.abandoned_waits);
    }

    pub(crate) fn record_resync(&self) {
        bump(&self.resyncs);
    }

    #[must_use]
    pub fn snapshot(&self) -> SyncSnapshot {
        SyncSnapshot {
            emitted: read(&self.emitted),
            dropped_late: read(&self.dropped_late),
            dropped_early: read(&self.dropped_early),
            superseded: read(&self.superseded),
            seeks: read(&self.seeks),
            corrections: read(&self.corrections),
            abandoned_waits: read(&self.abandoned_waits),
            resyncs: read(&self.resyncs),
        }
    }
}

/// Counters of one demuxer.
#[derive(Debug, Default)]
pub struct DemuxStats {
    video: AtomicU64,
    audio: AtomicU64,
    unrouted: AtomicU64,
    discarded: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DemuxSnapshot {
    pub video: u64,
    pub audio: u64,
    /// Packets matching neither discovered track.
    pub unrouted: u64,
    /// Packets of a routed track whose destination is absent or closed.
    pub discarded: u64,
}

impl DemuxSnapshot {
    /// Every packet the demuxer received.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.video + self.audio + self.unrouted + self.discarded
    }
}

impl DemuxStats {
    pub(crate) fn record_video(&self) {
        bump(&self.video);
    }

    pub(crate) fn record_audio(&self) {
        bump(&self.audio);
    }

    pub(crate) fn record_unrouted(&self) {
        bump(&self.unrouted);
    }

    pub(crate) fn record_discarded(&self) {
        bump(&self.discarded);
    }

    #[must_use]
    pub fn snapshot(&self) -> DemuxSnapshot {
        DemuxSnapshot {
            video: read(&self.video),
            audio: read(&self.audio),
            unrouted: read(&self.unrouted),
            discarded: read(&self.discarded),
        }
    }
}

/// Counters of one track decoder.
#[derive(Debug, Default)]
pub struct DecodeStats {
    decoded: AtomicU64,
    errors: AtomicU64,
    discarded: AtomicU64,
    resets: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeSnapshot {
    pub decoded: u64,
    pub errors: u64,
    /// Packets drained without decoding because the codec is unavailable.
    pub discarded: u64,
    /// Codec resets on a new seek generation.
    pub resets: u64,
}

impl DecodeStats {
    pub(crate) fn record_decoded(&self) {
        bump(&self.decoded);
    }

    pub(crate) fn record_error(&self) {
        bump(&self.errors);
    }

    pub(crate) fn record_discarded(&self) {
        bump(&self.discarded);
    }

    pub(crate) fn record_reset(&self) {
        bump(&self.resets);
    }

    #[must_use]
    pub fn snapshot(&self) -> DecodeSnapshot {
        DecodeSnapshot {
            decoded: read(&self.decoded),
            errors: read(&self.errors),
            discarded: read(&self.discarded),
            resets: read(&self.resets),
        }
    }
}

// SPDX-License-Identifier: MPL-2.0
//! Interruptible wait used by the sync engines.

use crate::playback::rebase::{Rebase, RebaseListener};
use std::time::Duration;
use tokio::sync::watch;

/// How an interruptible wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Elapsed,
    Rebased(Rebase),
    Shutdown,
}

/// Sleeps for `duration` unless a rebase or the shutdown signal arrives
/// first. Shutdown takes priority over a rebase, a rebase over the timer.
pub async fn wait_interruptible(
    duration: Duration,
    listener: &mut RebaseListener,
    shutdown: &mut watch::Receiver<bool>,
) -> WaitOutcome {
    tokio::select! {
        biased;
        () = shutdown_requested(shutdown) => WaitOutcome::Shutdown,
        rebase = listener.next() => WaitOutcome::Rebased(rebase),
        () = tokio::time::sleep(duration) => WaitOutcome::Elapsed,
    }
}

/// Resolves once shutdown is signalled or its sender is gone.
pub async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

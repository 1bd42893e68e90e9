// SPDX-License-Identifier: MPL-2.0
//! Video presenter port definition.

use crate::domain::media::VideoFrame;
use std::time::Duration;

/// Port for displaying video frames.
///
/// The presenter task calls `show` for each frame the sync engine released,
/// in order, then `report_position` with the frame's timecode. Both run on
/// the async runtime and must return quickly.
pub trait VideoPresenter: Send {
    fn show(&mut self, frame: &VideoFrame);

    /// Called after `show` with the timecode now on screen.
    fn report_position(&mut self, _timecode: Duration) {}
}

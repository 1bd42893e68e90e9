// SPDX-License-Identifier: MPL-2.0
//! Selection of the video and audio streams across one or two inputs.
//!
//! Audio is sometimes shipped in a separate file, so the player accepts a
//! second input. Rules:
//! - one input supplies every track it has
//! - with two inputs, a first input carrying both video and audio is used
//!   alone
//! - otherwise video comes from the first input that has video, and audio
//!   from an input other than the video one when possible

use crate::domain::media::{TrackKind, TrackMeta};
use crate::error::{Error, Result};
use crate::playback::demuxer::Routes;

/// Streams chosen for playback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Tracks discovered in each input, used for packet routing.
    pub routes: Vec<Routes>,
    /// Index of the input supplying video.
    pub video: Option<usize>,
    /// Index of the input supplying audio.
    pub audio: Option<usize>,
}

impl Selection {
    /// True when the input feeds at least one selected stream.
    #[must_use]
    pub fn uses(&self, input: usize) -> bool {
        self.video == Some(input) || self.audio == Some(input)
    }
}

fn first_of(tracks: &[TrackMeta], kind: TrackKind) -> Option<&TrackMeta> {
    tracks.iter().find(|track| track.kind == kind)
}

/// Picks the video and audio streams among `inputs`.
///
/// # Errors
///
/// Returns [`Error::NothingToPlay`] when no input has a video or audio track.
pub fn discover_streams(inputs: &[&[TrackMeta]]) -> Result<Selection> {
    let routes: Vec<Routes> = inputs
        .iter()
        .map(|tracks| Routes {
            video: first_of(tracks, TrackKind::Video).map(|track| track.id),
            audio: first_of(tracks, TrackKind::Audio).map(|track| track.id),
        })
        .collect();

    let (video, audio) = match routes.first() {
        Some(first) if first.video.is_some() && first.audio.is_some() => (Some(0), Some(0)),
        _ => {
            let video = routes.iter().position(|r| r.video.is_some());
            let audio = routes
                .iter()
                .enumerate()
                .filter(|(index, _)| Some(*index) != video)
                .chain(video.and_then(|index| routes.get(index).map(|r| (index, r))))
                .find(|(_, r)| r.audio.is_some())
                .map(|(index, _)| index);
            (video, audio)
        }
    };

    if video.is_none() && audio.is_none() {
        return Err(Error::NothingToPlay);
    }

    for (index, route) in routes.iter().enumerate() {
        tracing::info!(
            input = index,
            video = ?route.video.filter(|_| video == Some(index)),
            audio = ?route.audio.filter(|_| audio == Some(index)),
            "streams discovered"
        );
    }

    Ok(Selection {
        routes,
        video,
        audio,
    })
}

// SPDX-License-Identifier: MPL-2.0
//! Shared presentation cells and the video presenter task.
//!
//! These cells are the only state shared outside the queues:
//! - [`PlaybackPosition`]: written by the video engine (by the audio engine
//!   when there is no video), read by the UI
//! - [`CurrentFrame`]: written by the presenter task, read by the render loop

use crate::application::port::VideoPresenter;
use crate::domain::media::VideoFrame;
use crate::playback::decoder::Decoded;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Timecode currently being presented.
#[derive(Debug, Clone, Default)]
pub struct PlaybackPosition(Arc<RwLock<Duration>>);

impl PlaybackPosition {
    #[must_use]
    pub fn get(&self) -> Duration {
        *self.0.read()
    }

    pub fn set(&self, timecode: Duration) {
        *self.0.write() = timecode;
    }
}

/// Last frame handed to the presenter.
#[derive(Debug, Clone, Default)]
pub struct CurrentFrame(Arc<RwLock<Option<VideoFrame>>>);

impl CurrentFrame {
    /// Returns the frame on screen. Cloning only bumps the pixel `Arc`.
    #[must_use]
    pub fn get(&self) -> Option<VideoFrame> {
        self.0.read().clone()
    }

    pub fn replace(&self, frame: VideoFrame) {
        *self.0.write() = Some(frame);
    }
}

/// Spawns the task that pops frames from the video handoff queue, publishes
/// them in `current` and forwards them to `presenter`.
pub fn spawn_video_presenter(
    mut frames: mpsc::Receiver<Decoded<VideoFrame>>,
    current: CurrentFrame,
    mut presenter: Box<dyn VideoPresenter>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(Decoded { unit: frame, .. }) = frames.recv().await {
            current.replace(frame.clone());
            presenter.show(&frame);
            presenter.report_position(frame.timecode);
        }
        tracing::debug!("video presenter finished");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct Recorder {
        shown: Arc<Mutex<Vec<Duration>>>,
        reported: Arc<Mutex<Vec<Duration>>>,
    }

    impl VideoPresenter for Recorder {
        fn show(&mut self, frame: &VideoFrame) {
            self.shown.lock().unwrap().push(frame.timecode);
        }

        fn report_position(&mut self, timecode: Duration) {
            self.reported.lock().unwrap().push(timecode);
        }
    }

    #[test]
    fn position_cell_is_shared() {
        let position = PlaybackPosition::default();
        let reader = position.clone();
        position.set(Duration::from_secs(3));
        assert_eq!(reader.get(), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn presenter_task_publishes_frames_in_order() {
        let (tx, rx) = mpsc::channel(4);
        let current = CurrentFrame::default();
        let recorder = Recorder::default();
        let handle = spawn_video_presenter(rx, current.clone(), Box::new(recorder.clone()));

        for millis in [0, 40, 80] {
            let frame = VideoFrame::new(1, 1, vec![0; 4], Duration::from_millis(millis));
            tx.send(Decoded {
                generation: 0,
                unit: frame,
            })
            .await
            .unwrap();
        }
        drop(tx);
        handle.await.unwrap();

        let expected: Vec<Duration> = [0, 40, 80].map(Duration::from_millis).to_vec();
        assert_eq!(*recorder.shown.lock().unwrap(), expected);
        assert_eq!(*recorder.reported.lock().unwrap(), expected);
        assert_eq!(
            current.get().map(|frame| frame.timecode),
            Some(Duration::from_millis(80))
        );
    }
}

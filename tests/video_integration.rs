// SPDX-License-Identifier: MPL-2.0
//! Integration tests for the `FFmpeg` adapters and playback of real files.
//!
//! These tests validate the complete pipeline with real media files, including
//! multi-format support (MP4, AVI, MOV, MKV, `WebM`). Files live in
//! `tests/data/`; every test is skipped when its file is missing.

use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use syncplay::application::port::{OpenedInput, VideoPresenter};
use syncplay::domain::media::{AudioOutputConfig, VideoFrame};
use syncplay::error::Error;
use syncplay::infrastructure::FfmpegSource;
use syncplay::playback::{PipelineSettings, Player};

/// Packets read while looking for a first decoded unit.
const SEARCH_PACKETS: usize = 500;

fn open(path: &str, format_name: &str) -> Option<OpenedInput> {
    if !Path::new(path).exists() {
        eprintln!("Skipping {format_name} test: file not found");
        return None;
    }
    Some(
        FfmpegSource::open(Path::new(path))
            .unwrap_or_else(|e| panic!("Should open {format_name}: {e}")),
    )
}

/// Opens a file, builds its video codec and decodes until a first frame.
fn test_video_decoding(path: &str, format_name: &str) {
    let Some(mut input) = open(path, format_name) else {
        return;
    };

    let track = input
        .source
        .tracks()
        .iter()
        .find(|track| track.is_video())
        .cloned()
        .unwrap_or_else(|| panic!("{format_name} should have a video track"));
    let mut codec = input
        .codecs
        .video_codec(&track)
        .unwrap_or_else(|e| panic!("Should create {format_name} video codec: {e}"));

    let mut frame = None;
    for _ in 0..SEARCH_PACKETS {
        let Some(packet) = input.source.read_packet().expect("Should read packet") else {
            break;
        };
        if packet.track != track.id {
            continue;
        }
        if let Ok(mut frames) = codec.decode(&packet) {
            if !frames.is_empty() {
                frame = Some(frames.remove(0));
                break;
            }
        }
    }
    let frame = frame
        .or_else(|| codec.flush().into_iter().next())
        .unwrap_or_else(|| panic!("{format_name} should produce a frame"));

    assert!(frame.width > 0, "{format_name} frame width should be > 0");
    assert!(frame.height > 0, "{format_name} frame height should be > 0");
    assert_eq!(
        frame.pixels.len(),
        (frame.width * frame.height * 4) as usize,
        "{format_name} frame RGBA size should match dimensions"
    );
}

#[test]
fn test_decode_mp4() {
    test_video_decoding("tests/data/sample.mp4", "MP4");
}

#[test]
fn test_decode_avi() {
    test_video_decoding("tests/data/sample.avi", "AVI");
}

#[test]
fn test_decode_mov() {
    test_video_decoding("tests/data/sample.mov", "MOV");
}

#[test]
fn test_decode_mkv() {
    test_video_decoding("tests/data/sample.mkv", "MKV");
}

#[test]
fn test_decode_webm() {
    test_video_decoding("tests/data/sample.webm", "WebM");
}

/// Decodes audio into the default device format and checks the conversion.
fn test_audio_decoding(path: &str, format_name: &str) {
    let Some(mut input) = open(path, format_name) else {
        return;
    };
    let Some(track) = input
        .source
        .tracks()
        .iter()
        .find(|track| track.is_audio())
        .cloned()
    else {
        eprintln!("Skipping {format_name} audio test: no audio track");
        return;
    };

    let output = AudioOutputConfig::default();
    let mut codec = input
        .codecs
        .audio_codec(&track, output)
        .unwrap_or_else(|e| panic!("Should create {format_name} audio codec: {e}"));

    let mut batch = None;
    for _ in 0..SEARCH_PACKETS {
        let Some(packet) = input.source.read_packet().expect("Should read packet") else {
            break;
        };
        if packet.track != track.id {
            continue;
        }
        if let Ok(mut batches) = codec.decode(&packet) {
            if !batches.is_empty() {
                batch = Some(batches.remove(0));
                break;
            }
        }
    }
    let batch = batch.unwrap_or_else(|| panic!("{format_name} should produce samples"));

    assert_eq!(batch.sample_rate, output.sample_rate);
    assert_eq!(batch.channels, output.channels);
    assert_eq!(batch.pcm.len() % usize::from(batch.channels), 0);
    assert!(batch.pcm.iter().all(|s| s.is_finite()));
}

#[test]
fn test_audio_decode_mp4_with_audio() {
    test_audio_decoding("tests/data/sample_with_audio.mp4", "MP4 (with audio)");
}

#[test]
fn test_audio_decode_webm() {
    test_audio_decoding("tests/data/sample.webm", "WebM");
}

#[test]
fn test_audio_decode_mkv() {
    test_audio_decoding("tests/data/sample.mkv", "MKV");
}

#[test]
fn test_tracks_and_duration_are_read() {
    let Some(input) = open("tests/data/sample_no_audio.mp4", "MP4 (no audio)") else {
        return;
    };
    let tracks = input.source.tracks();
    assert!(tracks.iter().any(|track| track.is_video()));
    assert!(!tracks.iter().any(|track| track.is_audio()));
    let video = tracks.iter().find(|track| track.is_video()).unwrap();
    let params = video.video.expect("video dimensions are known");
    assert!(params.width > 0 && params.height > 0);
    assert!(input.source.duration().is_some());
}

#[test]
fn test_open_nonexistent_file() {
    let result = FfmpegSource::open(Path::new("tests/data/does_not_exist.mp4"));
    assert!(matches!(result, Err(Error::Open(_))));
}

#[test]
fn test_open_corrupted_file() {
    let path = "tests/data/corrupted.mp4";
    if !Path::new(path).exists() {
        return;
    }
    // Either rejected up front, or opened with whatever the prober found.
    if let Ok(input) = FfmpegSource::open(Path::new(path)) {
        let _ = input.source.tracks();
    }
}

#[derive(Clone, Default)]
struct Counter(Arc<Mutex<Vec<Duration>>>);

impl VideoPresenter for Counter {
    fn show(&mut self, frame: &VideoFrame) {
        self.0.lock().push(frame.timecode);
    }
}

/// Plays half a second from a seek position, then shuts down.
#[test]
fn test_playback_after_seek() {
    let Some(input) = open("tests/data/sample.mp4", "MP4") else {
        return;
    };

    let rt = tokio::runtime::Runtime::new().expect("Failed to create Tokio runtime");
    rt.block_on(async {
        let shown = Counter::default();
        let mut player = Player::start(
            vec![input],
            PipelineSettings::default(),
            Box::new(shown.clone()),
            None,
        )
        .expect("Should start playback");

        player.seek_control().seek(Duration::from_millis(500));
        tokio::time::sleep(Duration::from_millis(500)).await;
        player.shutdown();
        tokio::time::timeout(Duration::from_secs(5), player.wait())
            .await
            .expect("Playback should stop after shutdown");

        let shown = shown.0.lock().clone();
        assert!(!shown.is_empty(), "Frames should be presented");
        assert_eq!(player.report().video_sync.seeks, 1);
    });
}

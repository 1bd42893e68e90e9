// SPDX-License-Identifier: MPL-2.0
use std::io::BufRead;
use std::process::ExitCode;
use std::time::Duration;
use syncplay::application::port::VideoPresenter;
use syncplay::cli::{self, Command, Flags};
use syncplay::config;
use syncplay::domain::media::VideoFrame;
use syncplay::infrastructure::FfmpegSource;
use syncplay::playback::time_units::format_timecode;
use syncplay::playback::{AudioDevice, PipelineSettings, Player};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

/// Presenter for terminal playback: frames are only traced.
struct HeadlessPresenter;

impl VideoPresenter for HeadlessPresenter {
    fn show(&mut self, frame: &VideoFrame) {
        tracing::trace!(
            width = frame.width,
            height = frame.height,
            timecode_ms = frame.timecode.as_millis(),
            "frame"
        );
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("syncplay=info")),
        )
        .init();

    let flags = match Flags::from_env() {
        Ok(flags) => flags,
        Err(err) => {
            eprintln!("{err}\n\n{}", cli::HELP);
            return ExitCode::from(2);
        }
    };
    if flags.help {
        print!("{}", cli::HELP);
        return ExitCode::SUCCESS;
    }

    let mut settings = match &flags.config {
        Some(path) => match config::load_from_path(path) {
            Ok(config) => config,
            Err(err) => {
                tracing::error!(path = %path.display(), error = %err, "cannot read settings");
                return ExitCode::FAILURE;
            }
        },
        None => {
            let (config, warning) = config::load();
            if let Some(warning) = warning {
                tracing::warn!("{warning}");
            }
            config
        }
    };
    flags.apply_to(&mut settings);

    let mut inputs = Vec::with_capacity(flags.inputs.len());
    for path in &flags.inputs {
        match FfmpegSource::open(path) {
            Ok(input) => inputs.push(input),
            Err(err) => {
                tracing::error!(error = %err, "cannot open input");
                return ExitCode::FAILURE;
            }
        }
    }

    let device = match AudioDevice::open_default() {
        Ok(device) => Some(device),
        Err(err) => {
            tracing::warn!(error = %err, "no audio output");
            None
        }
    };

    let presenter = Box::new(HeadlessPresenter);
    let mut player = match Player::start(
        inputs,
        PipelineSettings::from_config(&settings),
        presenter,
        device,
    ) {
        Ok(player) => player,
        Err(err) => {
            tracing::error!(error = %err, "cannot start playback");
            return ExitCode::FAILURE;
        }
    };

    let mut commands = spawn_command_reader();
    let seek = player.seek_control();
    let volume = player.volume();
    let current = player.current_frame();
    let mut render = tokio::time::interval(settings.video.frame_interval());
    render.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut last_rendered = None;

    loop {
        tokio::select! {
            () = player.wait() => break,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break;
            }
            Some(command) = commands.recv() => match command {
                Command::Quit => break,
                Command::Seek(target) => {
                    seek.seek(target);
                    println!("seek {}", format_timecode(target));
                }
                Command::VolumeUp => {
                    volume.set(volume.get().increase());
                    tracing::info!(volume = volume.get().value(), "volume");
                }
                Command::VolumeDown => {
                    volume.set(volume.get().decrease());
                    tracing::info!(volume = volume.get().value(), "volume");
                }
            },
            _ = render.tick() => {
                if let Some(frame) = current.get() {
                    if last_rendered != Some(frame.timecode) {
                        last_rendered = Some(frame.timecode);
                        tracing::debug!(timecode = %format_timecode(frame.timecode), "render");
                    }
                }
            }
        }
    }

    player.shutdown();
    if tokio::time::timeout(Duration::from_secs(5), player.wait())
        .await
        .is_err()
    {
        tracing::warn!("pipeline did not stop in time");
    }
    player.report().log();
    ExitCode::SUCCESS
}

/// Forwards parsed stdin lines. The thread ends with stdin or the receiver.
fn spawn_command_reader() -> mpsc::UnboundedReceiver<Command> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            match cli::parse_command(&line) {
                Some(command) => {
                    if tx.send(command).is_err() {
                        break;
                    }
                }
                None if line.trim().is_empty() => {}
                None => eprintln!("unknown command: {}", line.trim()),
            }
        }
    });
    rx
}

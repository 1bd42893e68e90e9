// SPDX-License-Identifier: MPL-2.0
//! Command-line flags and interactive playback commands.

use crate::config::{ClockMaster, Config};
use crate::error::{Error, Result};
use crate::playback::time_units::parse_seconds;
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

pub const HELP: &str = "\
syncplay: synchronized audio/video playback

USAGE:
  syncplay [OPTIONS] <INPUT> [SECOND_INPUT]

A second input supplies the stream kind the first one lacks
(for example a video-only file plus a separate audio file).

OPTIONS:
  --fps <N>                 Limit the rendering rate
  --clock-master <MASTER>   audio, video or independent
  --volume <V>              Initial volume (0.0 to 1.5)
  --config <FILE>           Read settings from FILE instead of the default
  -h, --help                Print this help

COMMANDS (stdin, one per line):
  <seconds>   seek to the given position
  + / -       raise or lower the volume
  q           quit
";

/// Flags passed on the command line.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Flags {
    pub help: bool,
    /// Overrides `video.max_fps`.
    pub fps: Option<u32>,
    /// Overrides `sync.clock_master`.
    pub clock_master: Option<ClockMaster>,
    /// Explicit settings file.
    pub config: Option<PathBuf>,
    /// Overrides `audio.volume`.
    pub volume: Option<f32>,
    /// One or two media files.
    pub inputs: Vec<PathBuf>,
}

impl Flags {
    /// Parses flags from the process arguments.
    ///
    /// # Errors
    ///
    /// See [`Flags::parse`].
    pub fn from_env() -> Result<Self> {
        Self::parse(pico_args::Arguments::from_env())
    }

    /// Parses flags from `args`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for malformed values, unknown options or an
    /// input count other than one or two. `--help` skips input validation.
    pub fn parse(mut args: pico_args::Arguments) -> Result<Self> {
        let help = args.contains(["-h", "--help"]);
        let fps = args.opt_value_from_str("--fps").map_err(arg_error)?;
        let clock_master = args
            .opt_value_from_str("--clock-master")
            .map_err(arg_error)?;
        let config = args
            .opt_value_from_os_str("--config", |raw| {
                Ok::<_, std::convert::Infallible>(PathBuf::from(raw))
            })
            .map_err(arg_error)?;
        let volume = args.opt_value_from_str("--volume").map_err(arg_error)?;

        let rest = args.finish();
        if let Some(unknown) = rest.iter().find(|arg| is_option(arg)) {
            return Err(Error::Config(format!(
                "unknown option: {}",
                unknown.to_string_lossy()
            )));
        }
        let inputs: Vec<PathBuf> = rest.into_iter().map(PathBuf::from).collect();

        if !help && !(1..=2).contains(&inputs.len()) {
            return Err(Error::Config(format!(
                "expected one or two input files, got {}",
                inputs.len()
            )));
        }

        Ok(Self {
            help,
            fps,
            clock_master,
            config,
            volume,
            inputs,
        })
    }

    /// Writes the command-line overrides into `config`.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(fps) = self.fps {
            config.video.max_fps = Some(fps);
        }
        if let Some(master) = self.clock_master {
            config.sync.clock_master = Some(master);
        }
        if let Some(volume) = self.volume {
            config.audio.volume = Some(volume);
        }
    }
}

fn arg_error(err: pico_args::Error) -> Error {
    Error::Config(err.to_string())
}

fn is_option(arg: &OsString) -> bool {
    arg.to_str()
        .is_some_and(|s| s.starts_with('-') && s.len() > 1 && s.parse::<f64>().is_err())
}

/// A line typed on stdin while playing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Seek(Duration),
    VolumeUp,
    VolumeDown,
    Quit,
}

/// Parses one stdin line. Returns `None` for anything unrecognized.
#[must_use]
pub fn parse_command(line: &str) -> Option<Command> {
    match line.trim() {
        "q" | "quit" => Some(Command::Quit),
        "+" => Some(Command::VolumeUp),
        "-" => Some(Command::VolumeDown),
        other => parse_seconds(other).map(Command::Seek),
    }
}

//! # audio-pipeline-host
//!
//! Desktop backend for audio-pipeline-core.
//!
//! Provides:
//! - `DirFileService`: a directory standing in for the storage volume
//! - `ToneSource`: timer-paced sine generator in place of a microphone interrupt
//! - `PacedSink`: timer-paced consumer in place of a speaker interrupt, with a level meter
//! - `cli`: operator command line parser
//! - `Recorder`: the above wired into a running `Pipeline`
//!
//! ## Usage
//! ```ignore
//! use audio_pipeline_host::{HostConfig, Recorder};
//! use audio_pipeline_core::Command;
//!
//! let recorder = Recorder::start(&HostConfig::default())?;
//! let reply = recorder.pipeline.commands().execute(Command::StartRecord, timeout)?;
//! ```

pub mod args;
pub mod cli;
pub mod config_file;
pub mod dir_file_service;
pub mod paced_sink;
pub mod recorder;
pub mod tone_source;

pub use cli::{parse_line, CliAction, CliError};
pub use config_file::HostConfig;
pub use dir_file_service::DirFileService;
pub use paced_sink::{PacedSink, SinkMeter};
pub use recorder::{LogObserver, Recorder};
pub use tone_source::{ToneSettings, ToneSource};

use std::fmt;

use super::error::PipelineError;
use super::recording_result::RecordingSummary;
use super::state::ControllerState;
use crate::processing::wav_format::ContainerHeader;
use crate::traits::file_service::FileEntry;

/// Longest file name accepted at the command boundary.
pub const MAX_FILE_NAME_LEN: usize = 31;

/// A validated file name: 1-31 printable characters, no path separators.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileName(String);

impl FileName {
    pub fn new(name: impl Into<String>) -> Result<Self, PipelineError> {
        let name = name.into();
        if name.is_empty() || name.len() > MAX_FILE_NAME_LEN {
            return Err(PipelineError::InvalidFileName(name));
        }
        if name.chars().any(|c| c == '/' || c == '\\' || c.is_control() || c.is_whitespace()) {
            return Err(PipelineError::InvalidFileName(name));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for FileName {
    type Error = PipelineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for FileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Discrete operator command, consumed exactly once by the session controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    StartRecord,
    StopRecord,
    ListFiles,
    PlayFile(FileName),
    DeleteFile(FileName),
}

/// Status returned for a command that was accepted, refused or ignored.
///
/// Hard failures travel as `Err(PipelineError)` instead.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandReply {
    RecordingStarted,
    AlreadyRecording,
    RecordingStopped(RecordingSummary),
    NotRecording,
    Files(Vec<FileEntry>),
    PlaybackStarted { name: FileName, header: ContainerHeader },
    Deleted(FileName),
    Busy(ControllerState),
}

impl fmt::Display for CommandReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RecordingStarted => write!(f, "Recording started. Type 'stop' to finish."),
            Self::AlreadyRecording => write!(f, "Already recording. Stop first."),
            Self::RecordingStopped(summary) => {
                write!(f, "Recording stopped: {} samples", summary.sample_count)?;
                if summary.overflowed {
                    write!(f, " (buffer full)")?;
                }
                if let Some(error) = &summary.error {
                    write!(f, "; {}", error)?;
                }
                Ok(())
            }
            Self::NotRecording => write!(f, "Not currently recording."),
            Self::Files(entries) if entries.is_empty() => write!(f, "No recordings."),
            Self::Files(entries) => {
                for (i, entry) in entries.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "  {}  ({} bytes)", entry.name, entry.size)?;
                }
                Ok(())
            }
            Self::PlaybackStarted { name, header } => write!(
                f,
                "Playing {}: {} Hz, {} ch, {} bit, {} samples",
                name,
                header.sample_rate,
                header.channels,
                header.bits_per_sample,
                header.sample_count()
            ),
            Self::Deleted(name) => write!(f, "Deleted {}", name),
            Self::Busy(state) => write!(f, "Busy: {}", state),
        }
    }
}

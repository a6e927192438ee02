use thiserror::Error;

/// Errors that can occur anywhere in the record/store/playback pipeline.
///
/// Interrupt entry points never return these; they raise counters and flags
/// that the owning task turns into one of these on its next poll.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("capture buffer reached capacity")]
    CaptureOverflow,

    #[error("handoff to storage writer timed out; capture dropped")]
    HandoffTimeout,

    #[error("failed to open '{0}'")]
    StorageOpenFailed(String),

    #[error("short write: {written} of {expected} bytes")]
    StorageShortWrite { expected: usize, written: usize },

    #[error("short read: {read} of {expected} bytes")]
    StorageShortRead { expected: usize, read: usize },

    #[error("invalid audio file: {0}")]
    InvalidFormat(String),

    #[error("unsupported parameters: {0}")]
    UnsupportedParameters(String),

    #[error("file service not ready")]
    StorageNotReady,

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("invalid file name: {0}")]
    InvalidFileName(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("command queue full")]
    CommandQueueFull,

    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("playback sink stopped draining")]
    DrainTimeout,

    #[error("pipeline stopped")]
    PipelineStopped,

    #[error("internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Whether the error leaves the current session usable.
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::CaptureOverflow)
    }
}

/// Errors reported by a [`FileService`](crate::traits::file_service::FileService)
/// implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FileServiceError {
    #[error("volume not ready")]
    NotReady,

    #[error("no such file: {0}")]
    NotFound(String),

    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error("stale or unknown file handle")]
    BadHandle,

    #[error("i/o error: {0}")]
    Io(String),
}

impl From<FileServiceError> for PipelineError {
    fn from(error: FileServiceError) -> Self {
        match error {
            FileServiceError::NotReady => Self::StorageNotReady,
            FileServiceError::NotFound(name) => Self::FileNotFound(name),
            FileServiceError::InvalidName(name) => Self::InvalidFileName(name),
            other => Self::Storage(other.to_string()),
        }
    }
}

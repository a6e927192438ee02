use serde::{Deserialize, Serialize};

use super::audio_models::AudioFormat;
use super::error::PipelineError;

/// Outcome of one capture session, produced by the recording supervisor.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingSummary {
    pub session_id: u64,
    /// Interleaved samples captured (final write cursor).
    pub sample_count: usize,
    /// True iff the session ended by auto-stop rather than a stop command.
    pub overflowed: bool,
    /// Blocks the source feed refused because the arena was full.
    pub hard_overflows: u64,
    /// Set when the completed buffer could not be handed to the writer.
    pub error: Option<PipelineError>,
}

/// Message handed from the recording supervisor to the storage writer task.
///
/// The samples themselves stay in the capture arena; `session_id` must match
/// the arena's generation when the writer reads them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletedCapture {
    pub session_id: u64,
    pub sample_count: usize,
    pub overflowed: bool,
    pub format: AudioFormat,
}

/// Result returned when the storage writer task has persisted a capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingResult {
    pub id: String,
    pub file_name: String,
    pub sample_count: usize,
    pub data_bytes: u32,
    pub duration_secs: f64,
    pub overflowed: bool,
    pub checksum: String,
    pub created_at: String,
}

impl RecordingResult {
    pub fn new(
        file_name: &str,
        sample_count: usize,
        data_bytes: u32,
        format: &AudioFormat,
        overflowed: bool,
        checksum: &str,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            file_name: file_name.to_string(),
            sample_count,
            data_bytes,
            duration_secs: format.duration_secs(sample_count),
            overflowed,
            checksum: checksum.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Result of one playback stream, produced by the playback task.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackReport {
    pub file_name: String,
    pub expected_samples: usize,
    pub samples_played: usize,
    /// The file ended before its header's declared payload size.
    pub early_eof: bool,
    pub error: Option<PipelineError>,
}

impl PlaybackReport {
    pub fn is_complete(&self) -> bool {
        self.error.is_none() && self.samples_played == self.expected_samples
    }

    /// The payload shortfall of an early end of file, in bytes of `format`.
    pub fn short_read(&self, format: &AudioFormat) -> Option<PipelineError> {
        if !self.early_eof || self.error.is_some() {
            return None;
        }
        let bytes_per_sample = format.bytes_per_sample();
        Some(PipelineError::StorageShortRead {
            expected: self.expected_samples * bytes_per_sample,
            read: self.samples_played * bytes_per_sample,
        })
    }
}

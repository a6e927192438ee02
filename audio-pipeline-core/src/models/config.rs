use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::audio_models::{AudioFormat, MAX_SAMPLE_RATE};
use super::error::PipelineError;

/// Configuration for the whole pipeline.
///
/// Defaults describe a 16 kHz stereo 16-bit recorder with a 4 second arena.
/// Every field has a serde default so partial config files are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// System sample rate in Hz, used for capture and as the playback rate.
    pub sample_rate: u32,

    /// Interleaved channel count (1-8).
    pub channels: u16,

    /// Bits per stored sample (8 or 16).
    pub bits_per_sample: u16,

    /// Capture arena size in interleaved samples.
    pub capture_capacity: usize,

    /// Auto-stop fires once the write cursor reaches `capacity - reserved_margin`.
    pub reserved_margin: usize,

    /// Leading samples dropped by the storage writer task (one block of latency).
    pub ignored_samples: usize,

    /// Frames delivered per source "block ready" event.
    pub source_block_frames: usize,

    /// Frames requested per sink "ready for more" event.
    pub sink_quantum_frames: usize,

    /// Samples per playback ping/pong slot.
    pub playback_chunk_samples: usize,

    /// Bytes per payload write call.
    pub write_chunk_bytes: usize,

    pub supervisor_poll_ms: u64,
    pub handoff_timeout_ms: u64,
    pub handoff_queue_len: usize,
    pub stop_timeout_ms: u64,
    pub chunk_send_timeout_ms: u64,
    pub drain_poll_ms: u64,
    pub drain_poll_limit: u32,
    pub command_queue_len: usize,
    pub command_poll_ms: u64,

    /// How many names the filename policy may probe before giving up.
    pub filename_retries: u32,
}

impl PipelineConfig {
    pub fn format(&self) -> AudioFormat {
        AudioFormat::new(self.sample_rate, self.channels, self.bits_per_sample)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        let fail = |msg: String| Err(PipelineError::InvalidConfig(msg));

        if !(1..=MAX_SAMPLE_RATE).contains(&self.sample_rate) {
            return fail(format!(
                "sample rate {} Hz outside 1..={} Hz",
                self.sample_rate, MAX_SAMPLE_RATE
            ));
        }
        if !(1..=8).contains(&self.channels) {
            return fail(format!("unsupported channel count: {}", self.channels));
        }
        if ![8, 16].contains(&self.bits_per_sample) {
            return fail(format!("unsupported bit depth: {}", self.bits_per_sample));
        }

        let channels = self.channels as usize;
        if self.capture_capacity == 0 || self.capture_capacity % channels != 0 {
            return fail(format!(
                "capture capacity {} is not a whole number of {}-channel frames",
                self.capture_capacity, channels
            ));
        }
        if self.reserved_margin >= self.capture_capacity {
            return fail("reserved margin must be smaller than capture capacity".into());
        }
        if self.playback_chunk_samples == 0 || self.playback_chunk_samples % channels != 0 {
            return fail(format!(
                "playback chunk {} is not a whole number of frames",
                self.playback_chunk_samples
            ));
        }
        if self.source_block_frames == 0 || self.sink_quantum_frames == 0 {
            return fail("block and quantum sizes must be positive".into());
        }
        let bytes_per_sample = (self.bits_per_sample / 8) as usize;
        if self.write_chunk_bytes < bytes_per_sample || self.write_chunk_bytes % bytes_per_sample != 0 {
            return fail(format!("write chunk of {} bytes is not sample aligned", self.write_chunk_bytes));
        }
        if self.handoff_queue_len == 0 || self.command_queue_len == 0 {
            return fail("queue lengths must be positive".into());
        }
        if [
            self.supervisor_poll_ms,
            self.handoff_timeout_ms,
            self.stop_timeout_ms,
            self.chunk_send_timeout_ms,
            self.drain_poll_ms,
            self.command_poll_ms,
        ]
        .contains(&0)
            || self.drain_poll_limit == 0
        {
            return fail("timeouts and poll intervals must be positive".into());
        }
        if self.filename_retries == 0 {
            return fail("filename retries must be positive".into());
        }
        Ok(())
    }

    pub fn supervisor_poll(&self) -> Duration {
        Duration::from_millis(self.supervisor_poll_ms)
    }

    pub fn handoff_timeout(&self) -> Duration {
        Duration::from_millis(self.handoff_timeout_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    pub fn chunk_send_timeout(&self) -> Duration {
        Duration::from_millis(self.chunk_send_timeout_ms)
    }

    pub fn drain_poll(&self) -> Duration {
        Duration::from_millis(self.drain_poll_ms)
    }

    pub fn command_poll(&self) -> Duration {
        Duration::from_millis(self.command_poll_ms)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            channels: 2,
            bits_per_sample: 16,
            capture_capacity: 4 * 16_000 * 2,
            reserved_margin: 64,
            ignored_samples: 64,
            source_block_frames: 32,
            sink_quantum_frames: 32,
            playback_chunk_samples: 4096,
            write_chunk_bytes: 8 * 1024,
            supervisor_poll_ms: 100,
            handoff_timeout_ms: 100,
            handoff_queue_len: 2,
            stop_timeout_ms: 1000,
            chunk_send_timeout_ms: 500,
            drain_poll_ms: 10,
            drain_poll_limit: 1000,
            command_queue_len: 5,
            command_poll_ms: 200,
            filename_retries: 10,
        }
    }
}

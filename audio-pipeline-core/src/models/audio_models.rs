use serde::{Deserialize, Serialize};

/// Highest sample rate the pipeline accepts, in Hz.
pub const MAX_SAMPLE_RATE: u32 = 384_000;

/// PCM stream layout shared by capture, storage and playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl AudioFormat {
    pub const fn new(sample_rate: u32, channels: u16, bits_per_sample: u16) -> Self {
        Self {
            sample_rate,
            channels,
            bits_per_sample,
        }
    }

    pub fn bytes_per_sample(&self) -> usize {
        self.bits_per_sample as usize / 8
    }

    /// Bytes per interleaved frame (one sample for every channel).
    pub fn block_align(&self) -> u16 {
        self.channels.saturating_mul(self.bits_per_sample / 8)
    }

    /// Saturates for formats whose rate does not fit the header field;
    /// see [`AudioFormat::checked_byte_rate`].
    pub fn byte_rate(&self) -> u32 {
        self.checked_byte_rate().unwrap_or(u32::MAX)
    }

    pub fn checked_byte_rate(&self) -> Option<u32> {
        let block_align = self.channels.checked_mul(self.bits_per_sample / 8)?;
        self.sample_rate.checked_mul(u32::from(block_align))
    }

    /// Duration of `sample_count` interleaved samples.
    pub fn duration_secs(&self, sample_count: usize) -> f64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        sample_count as f64 / (self.sample_rate as f64 * self.channels as f64)
    }

    pub fn is_supported(&self) -> bool {
        (1..=8).contains(&self.channels)
            && matches!(self.bits_per_sample, 8 | 16)
            && (1..=MAX_SAMPLE_RATE).contains(&self.sample_rate)
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::new(16_000, 2, 16)
    }
}

/// Counters raised by the interrupt entry points, sampled by tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineDiagnostics {
    /// "Block ready" events seen by the source feed in the current session.
    pub capture_blocks: u64,
    /// Hardware overrun/underrun flags cleared by the source feed.
    pub capture_hw_errors: u64,
    /// Blocks refused (fully or partly) because the arena was full.
    pub capture_hard_overflows: u64,
    /// "Ready for more" events served by the sink feed.
    pub sink_requests: u64,
    /// Quanta that were padded with silence.
    pub sink_silence_quanta: u64,
    /// Requests that found a critical section held and emitted silence.
    pub sink_contended: u64,
}

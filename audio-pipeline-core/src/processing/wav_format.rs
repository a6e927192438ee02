//! Audio container (RIFF/WAVE) header codec.
//!
//! The header is derived entirely from the payload size and stream format,
//! written once before the payload and never patched afterwards.

use crate::models::audio_models::AudioFormat;
use crate::models::error::PipelineError;

/// Size of the standard WAV RIFF header in bytes.
pub const WAV_HEADER_SIZE: usize = 44;

/// Format code for uncompressed PCM.
pub const PCM_FORMAT_CODE: u16 = 1;

const PCM_FMT_CHUNK_SIZE: u32 = 16;

/// Parsed or to-be-written 44-byte container header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerHeader {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    /// Payload size in bytes.
    pub data_bytes: u32,
}

impl ContainerHeader {
    pub fn new(format: &AudioFormat, data_bytes: u32) -> Self {
        Self {
            sample_rate: format.sample_rate,
            channels: format.channels,
            bits_per_sample: format.bits_per_sample,
            data_bytes,
        }
    }

    /// Header for `sample_count` interleaved samples.
    ///
    /// Fails when the payload would not fit the 32-bit size fields.
    pub fn for_samples(format: &AudioFormat, sample_count: usize) -> Result<Self, PipelineError> {
        if format.checked_byte_rate().is_none() {
            return Err(PipelineError::UnsupportedParameters(format!(
                "{} Hz x {} ch x {} bit overflows the byte rate field",
                format.sample_rate, format.channels, format.bits_per_sample
            )));
        }
        let data_bytes = sample_count
            .checked_mul(format.bytes_per_sample())
            .and_then(|bytes| u32::try_from(bytes).ok())
            .filter(|bytes| bytes.checked_add(36).is_some())
            .ok_or_else(|| {
                PipelineError::UnsupportedParameters(format!("{} samples exceed the container size limit", sample_count))
            })?;
        Ok(Self::new(format, data_bytes))
    }

    pub fn format(&self) -> AudioFormat {
        AudioFormat::new(self.sample_rate, self.channels, self.bits_per_sample)
    }

    pub fn byte_rate(&self) -> u32 {
        self.format().byte_rate()
    }

    pub fn block_align(&self) -> u16 {
        self.format().block_align()
    }

    /// RIFF chunk size: everything after the first 8 bytes.
    pub fn chunk_size(&self) -> u32 {
        self.data_bytes.saturating_add(36)
    }

    /// Interleaved samples declared by the payload size.
    pub fn sample_count(&self) -> usize {
        let bytes_per_sample = (self.bits_per_sample / 8).max(1) as usize;
        self.data_bytes as usize / bytes_per_sample
    }

    /// Encode the header.
    ///
    /// Layout:
    /// ```text
    /// [0-3]    "RIFF"
    /// [4-7]    chunk size = 36 + data_bytes
    /// [8-11]   "WAVE"
    /// [12-15]  "fmt "
    /// [16-19]  16 (PCM format chunk size)
    /// [20-21]  1 (PCM format code)
    /// [22-23]  channels
    /// [24-27]  sample_rate
    /// [28-31]  byte_rate = sample_rate * channels * bits / 8
    /// [32-33]  block_align = channels * bits / 8
    /// [34-35]  bits_per_sample
    /// [36-39]  "data"
    /// [40-43]  data_bytes
    /// ```
    pub fn to_bytes(&self) -> [u8; WAV_HEADER_SIZE] {
        let mut header = [0u8; WAV_HEADER_SIZE];

        header[0..4].copy_from_slice(b"RIFF");
        header[4..8].copy_from_slice(&self.chunk_size().to_le_bytes());
        header[8..12].copy_from_slice(b"WAVE");

        header[12..16].copy_from_slice(b"fmt ");
        header[16..20].copy_from_slice(&PCM_FMT_CHUNK_SIZE.to_le_bytes());
        header[20..22].copy_from_slice(&PCM_FORMAT_CODE.to_le_bytes());
        header[22..24].copy_from_slice(&self.channels.to_le_bytes());
        header[24..28].copy_from_slice(&self.sample_rate.to_le_bytes());
        header[28..32].copy_from_slice(&self.byte_rate().to_le_bytes());
        header[32..34].copy_from_slice(&self.block_align().to_le_bytes());
        header[34..36].copy_from_slice(&self.bits_per_sample.to_le_bytes());

        header[36..40].copy_from_slice(b"data");
        header[40..44].copy_from_slice(&self.data_bytes.to_le_bytes());

        header
    }

    /// Parse and structurally validate a header.
    ///
    /// Checks the four tags, the PCM format code, and that the channel count
    /// and bit depth are ones the pipeline can carry. Whether the format
    /// matches the playback hardware is left to the caller.
    pub fn parse(bytes: &[u8]) -> Result<Self, PipelineError> {
        let invalid = |msg: &str| Err(PipelineError::InvalidFormat(msg.to_string()));

        if bytes.len() < WAV_HEADER_SIZE {
            return invalid("header truncated");
        }
        if &bytes[0..4] != b"RIFF" {
            return invalid("missing RIFF tag");
        }
        if &bytes[8..12] != b"WAVE" {
            return invalid("missing WAVE tag");
        }
        if &bytes[12..16] != b"fmt " {
            return invalid("missing fmt chunk");
        }
        if read_u16(bytes, 20) != PCM_FORMAT_CODE {
            return invalid("payload is not uncompressed PCM");
        }
        if &bytes[36..40] != b"data" {
            return invalid("missing data chunk");
        }

        let header = Self {
            channels: read_u16(bytes, 22),
            sample_rate: read_u32(bytes, 24),
            bits_per_sample: read_u16(bytes, 34),
            data_bytes: read_u32(bytes, 40),
        };
        if !(1..=8).contains(&header.channels) {
            return Err(PipelineError::InvalidFormat(format!("unsupported channel count {}", header.channels)));
        }
        if !matches!(header.bits_per_sample, 8 | 16) {
            return Err(PipelineError::InvalidFormat(format!(
                "unsupported bit depth {}",
                header.bits_per_sample
            )));
        }
        Ok(header)
    }
}

fn read_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

use std::sync::Arc;

use crate::models::audio_models::AudioFormat;
use crate::models::error::PipelineError;
use crate::processing::pcm;
use crate::processing::wav_format::{ContainerHeader, WAV_HEADER_SIZE};
use crate::storage::open_file::OpenFile;
use crate::traits::file_service::{FileService, OpenMode};

/// An open, validated container file positioned at the start of its payload.
///
/// Dropping the stream closes the file.
pub struct PlaybackStream {
    file: OpenFile,
    header: ContainerHeader,
    expected_samples: usize,
    samples_read: usize,
    eof: bool,
    scratch: Vec<u8>,
}

/// Open `name` and validate its header against the playback capability.
///
/// Channel count and bit depth must match the capability. A different sample
/// rate is only logged: playback proceeds at the system rate. Any failure
/// closes the file before returning.
pub fn open_for_playback(
    fs: Arc<dyn FileService>,
    name: &str,
    capability: &AudioFormat,
) -> Result<PlaybackStream, PipelineError> {
    if !fs.is_ready() {
        return Err(PipelineError::StorageNotReady);
    }
    let file = OpenFile::open(fs, name, OpenMode::Read).map_err(|e| match PipelineError::from(e) {
        PipelineError::FileNotFound(name) => PipelineError::FileNotFound(name),
        other => PipelineError::StorageOpenFailed(format!("{}: {}", name, other)),
    })?;

    let mut raw = [0u8; WAV_HEADER_SIZE];
    let read = read_full(&file, &mut raw)?;
    if read != WAV_HEADER_SIZE {
        return Err(PipelineError::StorageShortRead {
            expected: WAV_HEADER_SIZE,
            read,
        });
    }

    let header = ContainerHeader::parse(&raw)?;
    if header.channels != capability.channels {
        return Err(PipelineError::InvalidFormat(format!(
            "{} channels, playback supports {}",
            header.channels, capability.channels
        )));
    }
    if header.bits_per_sample != capability.bits_per_sample {
        return Err(PipelineError::InvalidFormat(format!(
            "{} bit samples, playback supports {} bit",
            header.bits_per_sample, capability.bits_per_sample
        )));
    }
    if header.sample_rate != capability.sample_rate {
        log::warn!(
            "{} is {} Hz, playing at {} Hz",
            name,
            header.sample_rate,
            capability.sample_rate
        );
    }

    let channels = header.channels as usize;
    let expected_samples = header.sample_count() - header.sample_count() % channels;
    log::info!(
        "opened {}: {} Hz, {} ch, {} bit, {} samples",
        name,
        header.sample_rate,
        header.channels,
        header.bits_per_sample,
        expected_samples
    );

    Ok(PlaybackStream {
        file,
        header,
        expected_samples,
        samples_read: 0,
        eof: false,
        scratch: Vec::new(),
    })
}

impl PlaybackStream {
    pub fn name(&self) -> &str {
        self.file.name()
    }

    pub fn header(&self) -> &ContainerHeader {
        &self.header
    }

    /// Samples the header declares, trimmed to whole frames.
    pub fn expected_samples(&self) -> usize {
        self.expected_samples
    }

    pub fn samples_read(&self) -> usize {
        self.samples_read
    }

    /// Samples still expected from the file.
    pub fn remaining(&self) -> usize {
        if self.eof {
            0
        } else {
            self.expected_samples - self.samples_read
        }
    }

    /// The file ended before the declared payload size.
    pub fn hit_early_eof(&self) -> bool {
        self.eof
    }

    /// Read up to `out.len()` samples, stopping early only at end of file.
    ///
    /// A zero-byte read before the declared size is logged and treated as
    /// the end of the stream.
    pub fn read_samples(&mut self, out: &mut [i16]) -> Result<usize, PipelineError> {
        let want = out.len().min(self.remaining());
        if want == 0 {
            return Ok(0);
        }

        let bytes_per_sample = (self.header.bits_per_sample / 8) as usize;
        self.scratch.resize(want * bytes_per_sample, 0);
        let filled = read_full(&self.file, &mut self.scratch)?;
        if filled < self.scratch.len() {
            log::warn!(
                "{}: end of file after {} of {} samples",
                self.file.name(),
                self.samples_read + filled / bytes_per_sample,
                self.expected_samples
            );
            self.eof = true;
        }

        let count = pcm::decode_samples(&self.scratch[..filled], self.header.bits_per_sample, out);
        self.samples_read += count;
        Ok(count)
    }
}

/// Read until `buf` is full or the file reports end of file.
fn read_full(file: &OpenFile, buf: &mut [u8]) -> Result<usize, PipelineError> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

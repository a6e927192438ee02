use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::models::audio_models::AudioFormat;
use crate::models::error::PipelineError;
use crate::processing::pcm::{self, PcmSource};
use crate::processing::wav_format::ContainerHeader;
use crate::storage::open_file::OpenFile;
use crate::traits::file_service::{FileService, OpenMode};
use crate::traits::power::{IdleLease, PowerPolicy};

/// A file written by [`WavWriter::save`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedFile {
    pub name: String,
    pub header: ContainerHeader,
    /// Header plus payload.
    pub bytes_written: u64,
    /// SHA-256 hex digest of every byte written.
    pub checksum: String,
}

/// Chunked WAV writer over a [`FileService`].
///
/// ## File Format
///
/// ```text
/// [44-byte header, final sizes known up front]
/// [interleaved PCM payload, written in chunks of `chunk_bytes`]
/// ```
///
/// A short write anywhere aborts the save. The partial file stays on the
/// volume; deleting it is up to the caller.
pub struct WavWriter {
    fs: Arc<dyn FileService>,
    power: Arc<dyn PowerPolicy>,
    chunk_bytes: usize,
}

impl WavWriter {
    pub fn new(fs: Arc<dyn FileService>, power: Arc<dyn PowerPolicy>, chunk_bytes: usize) -> Self {
        Self {
            fs,
            power,
            chunk_bytes: chunk_bytes.max(2),
        }
    }

    /// Write `sample_count` samples from `samples` to `name`.
    pub fn save<S: PcmSource + ?Sized>(
        &self,
        samples: &S,
        sample_count: usize,
        format: &AudioFormat,
        name: &str,
    ) -> Result<SavedFile, PipelineError> {
        if !format.is_supported() {
            return Err(PipelineError::UnsupportedParameters(format!(
                "{} Hz, {} channels at {} bits",
                format.sample_rate, format.channels, format.bits_per_sample
            )));
        }
        if sample_count % format.channels as usize != 0 {
            return Err(PipelineError::UnsupportedParameters(format!(
                "{} samples is not a whole number of {}-channel frames",
                sample_count, format.channels
            )));
        }
        if sample_count > samples.sample_count() {
            return Err(PipelineError::UnsupportedParameters(format!(
                "asked for {} samples, source holds {}",
                sample_count,
                samples.sample_count()
            )));
        }
        if !self.fs.is_ready() {
            return Err(PipelineError::StorageNotReady);
        }

        let header = ContainerHeader::for_samples(format, sample_count)?;
        let _lease = IdleLease::acquire(self.power.as_ref());

        let file = OpenFile::open(Arc::clone(&self.fs), name, OpenMode::Write)
            .map_err(|e| PipelineError::StorageOpenFailed(format!("{}: {}", name, e)))?;
        let mut hasher = Sha256::new();
        let mut bytes_written = 0u64;

        let header_bytes = header.to_bytes();
        write_all_or_fail(&file, &header_bytes, &mut hasher)?;
        bytes_written += header_bytes.len() as u64;

        let bytes_per_sample = format.bytes_per_sample();
        let samples_per_chunk = (self.chunk_bytes / bytes_per_sample).max(1);
        let mut scratch = vec![0i16; samples_per_chunk];
        let mut encoded = Vec::with_capacity(samples_per_chunk * bytes_per_sample);
        let mut offset = 0;

        while offset < sample_count {
            let want = samples_per_chunk.min(sample_count - offset);
            let got = samples.copy_samples(offset, &mut scratch[..want]);
            if got != want {
                return Err(PipelineError::Internal(format!(
                    "sample source ended at {} of {}",
                    offset + got,
                    sample_count
                )));
            }

            encoded.clear();
            pcm::encode_samples(&scratch[..got], format.bits_per_sample, &mut encoded);
            write_all_or_fail(&file, &encoded, &mut hasher)?;

            bytes_written += encoded.len() as u64;
            offset += got;
            log::trace!("{}: {} of {} samples written", name, offset, sample_count);
        }

        if let Err(e) = file.sync() {
            log::warn!("sync of '{}' failed: {}", name, e);
        }
        file.close()
            .map_err(|e| PipelineError::Storage(format!("close of '{}' failed: {}", name, e)))?;

        log::info!("saved {} ({} samples, {} bytes)", name, sample_count, bytes_written);
        Ok(SavedFile {
            name: name.to_string(),
            header,
            bytes_written,
            checksum: hex_encode(&hasher.finalize()),
        })
    }
}

fn write_all_or_fail(file: &OpenFile, bytes: &[u8], hasher: &mut Sha256) -> Result<(), PipelineError> {
    let written = file.write(bytes)?;
    hasher.update(&bytes[..written.min(bytes.len())]);
    if written != bytes.len() {
        log::error!("short write to '{}': {} of {} bytes", file.name(), written, bytes.len());
        return Err(PipelineError::StorageShortWrite {
            expected: bytes.len(),
            written,
        });
    }
    Ok(())
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryFileService;
    use crate::traits::power::NoPowerPolicy;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[derive(Default)]
    struct CountingPower {
        depth: AtomicI32,
        leases: AtomicI32,
    }

    impl PowerPolicy for CountingPower {
        fn lock_idle(&self) {
            self.depth.fetch_add(1, Ordering::SeqCst);
            self.leases.fetch_add(1, Ordering::SeqCst);
        }
        fn unlock_idle(&self) {
            self.depth.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn writer(fs: &Arc<MemoryFileService>, chunk_bytes: usize) -> WavWriter {
        WavWriter::new(fs.clone(), Arc::new(NoPowerPolicy), chunk_bytes)
    }

    #[test]
    fn four_seconds_of_16k_stereo() {
        let fs = Arc::new(MemoryFileService::new());
        let samples: Vec<i16> = (0..128_000).map(|i| (i % 1000) as i16).collect();
        let format = AudioFormat::new(16_000, 2, 16);

        let saved = writer(&fs, 8192).save(&samples, samples.len(), &format, "rec_0000.wav").unwrap();

        let bytes = fs.contents("rec_0000.wav").unwrap();
        assert_eq!(bytes.len(), 44 + 256_000);
        assert_eq!(saved.bytes_written, bytes.len() as u64);
        assert_eq!(saved.header.data_bytes, 256_000);
        assert_eq!(saved.header.byte_rate(), 64_000);
        assert_eq!(&bytes[44..48], &[0, 0, 1, 0]);
        assert_eq!(saved.checksum, hex_encode(&Sha256::digest(&bytes)));
        assert_eq!(fs.open_handles(), 0);
    }

    #[test]
    fn eight_bit_payload_is_one_byte_per_sample() {
        let fs = Arc::new(MemoryFileService::new());
        let format = AudioFormat::new(8_000, 1, 8);
        writer(&fs, 3).save(&[0i16, i16::MAX, i16::MIN][..], 3, &format, "m.wav").unwrap();

        let bytes = fs.contents("m.wav").unwrap();
        assert_eq!(&bytes[44..], &[128, 255, 0]);
    }

    #[test]
    fn rejects_unsupported_parameters_before_touching_storage() {
        let fs = Arc::new(MemoryFileService::new());
        let format = AudioFormat::new(16_000, 9, 16);
        let result = writer(&fs, 8192).save(&vec![0i16; 9], 9, &format, "x.wav");
        assert!(matches!(result, Err(PipelineError::UnsupportedParameters(_))));
        assert!(!fs.exists("x.wav"));

        let format = AudioFormat::new(16_000, 2, 24);
        assert!(writer(&fs, 8192).save(&vec![0i16; 4], 4, &format, "x.wav").is_err());
    }

    #[test]
    fn out_of_range_sample_rate_is_refused() {
        let fs = Arc::new(MemoryFileService::new());
        let format = AudioFormat::new(u32::MAX, 8, 16);
        let result = writer(&fs, 8192).save(&vec![0i16; 16], 16, &format, "x.wav");
        assert!(matches!(result, Err(PipelineError::UnsupportedParameters(_))));
        assert!(!fs.exists("x.wav"));
    }

    #[test]
    fn not_ready_volume_is_refused() {
        let fs = Arc::new(MemoryFileService::new());
        fs.set_ready(false);
        let result = writer(&fs, 8192).save(&vec![0i16; 4], 4, &AudioFormat::default(), "x.wav");
        assert_eq!(result, Err(PipelineError::StorageNotReady));
    }

    #[test]
    fn short_write_aborts_and_closes() {
        let fs = Arc::new(MemoryFileService::new());
        fs.set_write_budget(Some(44 + 10));
        let power = Arc::new(CountingPower::default());
        let writer = WavWriter::new(fs.clone(), power.clone(), 8);

        let result = writer.save(&vec![1i16; 64], 64, &AudioFormat::default(), "x.wav");
        assert_eq!(
            result,
            Err(PipelineError::StorageShortWrite {
                expected: 8,
                written: 2
            })
        );
        assert_eq!(fs.open_handles(), 0);
        assert_eq!(fs.contents("x.wav").unwrap().len(), 54);
        assert_eq!(power.depth.load(Ordering::SeqCst), 0);
        assert_eq!(power.leases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn sync_failure_is_not_fatal_but_close_failure_is() {
        let fs = Arc::new(MemoryFileService::new());
        fs.set_fail_sync(true);
        assert!(writer(&fs, 8192).save(&vec![0i16; 4], 4, &AudioFormat::default(), "a.wav").is_ok());

        fs.set_fail_close(true);
        let result = writer(&fs, 8192).save(&vec![0i16; 4], 4, &AudioFormat::default(), "b.wav");
        assert!(matches!(result, Err(PipelineError::Storage(_))));
    }

    #[test]
    fn partial_frames_are_refused() {
        let fs = Arc::new(MemoryFileService::new());
        let result = writer(&fs, 8192).save(&vec![0i16; 3], 3, &AudioFormat::default(), "a.wav");
        assert!(matches!(result, Err(PipelineError::UnsupportedParameters(_))));
    }
}

use std::sync::Arc;

use crossbeam_channel::{Receiver, RecvTimeoutError};

use super::shared::Shared;
use super::signals::Signals;
use crate::models::error::PipelineError;
use crate::models::recording_result::{CompletedCapture, RecordingResult};
use crate::storage::naming::{find_available_name, FilenamePolicy};
use crate::storage::wav_writer::WavWriter;

/// Storage writer task: persists completed captures from the arena.
///
/// Clears `WRITING` when done with a capture, whether or not the save
/// succeeded.
pub struct StorageWriterTask {
    shared: Arc<Shared>,
    writer: WavWriter,
    naming: Box<dyn FilenamePolicy>,
    handoff: Receiver<CompletedCapture>,
}

impl StorageWriterTask {
    pub fn new(
        shared: Arc<Shared>,
        writer: WavWriter,
        naming: Box<dyn FilenamePolicy>,
        handoff: Receiver<CompletedCapture>,
    ) -> Self {
        Self {
            shared,
            writer,
            naming,
            handoff,
        }
    }

    pub fn run(mut self) {
        while !self.shared.is_shutdown() {
            match self.handoff.recv_timeout(self.shared.config.supervisor_poll()) {
                Ok(capture) => {
                    match self.persist(&capture) {
                        Ok(result) => {
                            self.shared.observer.on_recording_saved(&result);
                            self.shared.set_last_saved(result);
                        }
                        Err(e) => self.shared.report_error(e),
                    }
                    self.shared.update_signals(Signals::NONE, Signals::WRITING);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }

    fn persist(&mut self, capture: &CompletedCapture) -> Result<RecordingResult, PipelineError> {
        let arena = &self.shared.capture;
        if arena.generation() != capture.session_id {
            return Err(PipelineError::Internal(format!(
                "capture {} was overwritten by session {} before it was saved",
                capture.session_id,
                arena.generation()
            )));
        }

        let config = &self.shared.config;
        let channels = capture.format.channels as usize;
        let skip = config.ignored_samples.min(capture.sample_count) / channels * channels;
        let sample_count = capture.sample_count - skip;
        let samples = arena.view(skip, sample_count);

        let name = find_available_name(self.naming.as_mut(), self.shared.fs.as_ref(), config.filename_retries)?;
        log::debug!(
            "saving session {} as {} ({} leading samples dropped)",
            capture.session_id,
            name,
            skip
        );
        let saved = self.writer.save(&samples, sample_count, &capture.format, &name)?;

        Ok(RecordingResult::new(
            &saved.name,
            sample_count,
            saved.header.data_bytes,
            &capture.format,
            capture.overflowed,
            &saved.checksum,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::PipelineConfig;
    use crate::storage::memory::MemoryFileService;
    use crate::storage::naming::SequentialNames;
    use crate::traits::file_service::FileService;
    use crate::traits::observer::NoopObserver;
    use crate::traits::power::NoPowerPolicy;

    fn task(fs: Arc<MemoryFileService>, ignored_samples: usize) -> StorageWriterTask {
        let config = PipelineConfig {
            capture_capacity: 64,
            reserved_margin: 4,
            ignored_samples,
            ..Default::default()
        };
        let shared = Arc::new(Shared::new(config, fs.clone(), Arc::new(NoopObserver)));
        let writer = WavWriter::new(fs, Arc::new(NoPowerPolicy), 8192);
        let (_tx, rx) = crossbeam_channel::bounded(1);
        StorageWriterTask::new(shared, writer, Box::new(SequentialNames::default()), rx)
    }

    fn capture_ramp(task: &StorageWriterTask, len: usize) -> CompletedCapture {
        let arena = &task.shared.capture;
        arena.arm();
        let block: Vec<i16> = (0..len as i16).collect();
        arena.on_block_ready(&block);
        let snapshot = arena.disarm();
        CompletedCapture {
            session_id: snapshot.generation,
            sample_count: snapshot.sample_count,
            overflowed: false,
            format: task.shared.config.format(),
        }
    }

    #[test]
    fn drops_leading_samples_in_whole_frames() {
        let fs = Arc::new(MemoryFileService::new());
        let mut task = task(fs.clone(), 5);
        let capture = capture_ramp(&task, 20);

        let result = task.persist(&capture).unwrap();
        assert_eq!(result.file_name, "rec_0000.wav");
        assert_eq!(result.sample_count, 16);

        let bytes = fs.contents("rec_0000.wav").unwrap();
        assert_eq!(bytes.len(), 44 + 32);
        assert_eq!(i16::from_le_bytes([bytes[44], bytes[45]]), 4);
    }

    #[test]
    fn short_capture_saves_empty_payload() {
        let fs = Arc::new(MemoryFileService::new());
        let mut task = task(fs.clone(), 64);
        let capture = capture_ramp(&task, 10);

        let result = task.persist(&capture).unwrap();
        assert_eq!(result.sample_count, 0);
        assert_eq!(fs.contents(&result.file_name).unwrap().len(), 44);
    }

    #[test]
    fn stale_generation_is_refused() {
        let fs = Arc::new(MemoryFileService::new());
        let mut task = task(fs.clone(), 0);
        let capture = capture_ramp(&task, 8);
        task.shared.capture.arm();

        assert!(matches!(task.persist(&capture), Err(PipelineError::Internal(_))));
        assert!(fs.list().unwrap().is_empty());
    }

    #[test]
    fn second_save_takes_next_name() {
        let fs = Arc::new(MemoryFileService::new());
        let mut task = task(fs.clone(), 0);
        let capture = capture_ramp(&task, 8);

        assert_eq!(task.persist(&capture).unwrap().file_name, "rec_0000.wav");
        assert_eq!(task.persist(&capture).unwrap().file_name, "rec_0001.wav");
    }
}

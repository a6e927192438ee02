use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, RecvTimeoutError};

use super::shared::Shared;
use super::signals::Signals;
use crate::models::error::PipelineError;
use crate::models::recording_result::PlaybackReport;
use crate::processing::playback_buffers::AudioChunk;
use crate::traits::sample_sink::SampleSink;

/// Message from the storage reader to the playback task.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackMessage {
    Start { file_name: String, expected_samples: usize },
    Chunk(AudioChunk),
    Abort { reason: PipelineError },
}

/// Playback task: publishes chunks to the sink and waits for each to drain.
pub struct PlaybackTask {
    shared: Arc<Shared>,
    sink: Box<dyn SampleSink>,
    chunks: Receiver<PlaybackMessage>,
}

enum ChunkOutcome {
    Drained,
    Stalled,
    Stopped,
}

impl PlaybackTask {
    pub fn new(shared: Arc<Shared>, sink: Box<dyn SampleSink>, chunks: Receiver<PlaybackMessage>) -> Self {
        Self { shared, sink, chunks }
    }

    pub fn run(mut self) {
        while !self.shared.is_shutdown() {
            match self.chunks.recv_timeout(self.shared.config.supervisor_poll()) {
                Ok(PlaybackMessage::Start {
                    file_name,
                    expected_samples,
                }) => self.play(file_name, expected_samples),
                Ok(PlaybackMessage::Chunk(chunk)) => {
                    log::warn!("dropping {:?} chunk outside a stream", chunk.slot);
                    self.shared.playback.release_slot(chunk.slot);
                }
                Ok(PlaybackMessage::Abort { .. }) => {}
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }

    fn play(&mut self, file_name: String, expected_samples: usize) {
        let shared = Arc::clone(&self.shared);
        let buffers = Arc::clone(&shared.playback);
        buffers.begin();

        let mut report = PlaybackReport {
            file_name,
            expected_samples,
            samples_played: 0,
            early_eof: false,
            error: None,
        };
        let mut sink_started = false;
        log::info!("playing {} ({} samples)", report.file_name, expected_samples);

        loop {
            let message = match self.next_message() {
                Some(message) => message,
                None => {
                    report.error = Some(PipelineError::Timeout("next playback chunk"));
                    break;
                }
            };

            let chunk = match message {
                PlaybackMessage::Chunk(chunk) => chunk,
                PlaybackMessage::Abort { reason } => {
                    report.error = Some(reason);
                    break;
                }
                PlaybackMessage::Start { file_name, .. } => {
                    report.error = Some(PipelineError::Internal(format!(
                        "stream {} started while {} was playing",
                        file_name, report.file_name
                    )));
                    break;
                }
            };

            if !sink_started && chunk.sample_count > 0 {
                if let Err(e) = self.sink.start(Arc::clone(&buffers)) {
                    buffers.release_slot(chunk.slot);
                    report.error = Some(e);
                    break;
                }
                sink_started = true;
            }

            if let Err(e) = buffers.publish(chunk) {
                buffers.release_slot(chunk.slot);
                report.error = Some(e);
                break;
            }

            let outcome = self.wait_for_drain();
            buffers.release_slot(chunk.slot);
            match outcome {
                ChunkOutcome::Drained => {}
                ChunkOutcome::Stalled => {
                    report.error = Some(PipelineError::DrainTimeout);
                    break;
                }
                ChunkOutcome::Stopped => {
                    report.error = Some(PipelineError::PipelineStopped);
                    break;
                }
            }

            report.samples_played += chunk.sample_count;
            log::debug!(
                "{}: {} of {} samples played",
                report.file_name,
                report.samples_played,
                expected_samples
            );
            if chunk.is_last {
                report.early_eof = report.samples_played < expected_samples;
                break;
            }
        }

        if report.error.is_some() {
            self.abandon_stream();
        }
        if sink_started {
            if let Err(e) = self.sink.stop() {
                shared.report_warning(&e);
            }
        }
        buffers.reset();
        self.finish(report);
    }

    fn next_message(&self) -> Option<PlaybackMessage> {
        let poll = self.shared.config.drain_poll();
        for _ in 0..self.shared.config.drain_poll_limit {
            if self.shared.is_shutdown() {
                return None;
            }
            match self.chunks.recv_timeout(poll) {
                Ok(message) => return Some(message),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return None,
            }
        }
        None
    }

    /// Bounded poll until the sink has taken every sample of the chunk.
    fn wait_for_drain(&self) -> ChunkOutcome {
        let buffers = &self.shared.playback;
        for _ in 0..self.shared.config.drain_poll_limit {
            if buffers.remaining() == 0 {
                return ChunkOutcome::Drained;
            }
            if self.shared.is_shutdown() {
                return ChunkOutcome::Stopped;
            }
            thread::sleep(self.shared.config.drain_poll());
        }
        if buffers.remaining() == 0 {
            ChunkOutcome::Drained
        } else {
            ChunkOutcome::Stalled
        }
    }

    /// Stop the reader and hand back any slots still in flight.
    fn abandon_stream(&self) {
        let buffers = &self.shared.playback;
        buffers.reset();
        self.shared.reader_cancel.store(true, Ordering::Release);
        while let Ok(message) = self.chunks.try_recv() {
            if let PlaybackMessage::Chunk(chunk) = message {
                buffers.release_slot(chunk.slot);
            }
        }
    }

    fn finish(&self, report: PlaybackReport) {
        let shared = &self.shared;
        match (&report.error, report.short_read(&shared.config.format())) {
            (Some(e), _) => shared.report_error(e.clone()),
            (None, Some(warning)) => shared.report_warning(&warning),
            (None, None) => log::info!("finished {} ({} samples)", report.file_name, report.samples_played),
        }

        shared.observer.on_playback_finished(&report);
        shared.set_last_playback(report);
        shared.set_now_playing(None);
        shared.update_signals(Signals::PLAYBACK_DONE, Signals::PLAYING);
    }
}

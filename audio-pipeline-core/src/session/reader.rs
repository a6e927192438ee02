use std::sync::atomic::Ordering;
use std::sync::Arc;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use super::playback::PlaybackMessage;
use super::shared::Shared;
use super::signals::Signals;
use crate::models::error::PipelineError;
use crate::processing::playback_buffers::{AudioChunk, Slot};
use crate::storage::wav_reader::PlaybackStream;

/// Storage reader task: streams an opened file into the ping-pong slots.
///
/// Per stream it sends `Start`, then one `Chunk` per filled slot with the
/// final one tagged `is_last`, or `Abort` if reading fails.
pub struct StorageReaderTask {
    shared: Arc<Shared>,
    streams: Receiver<PlaybackStream>,
    chunks: Sender<PlaybackMessage>,
}

impl StorageReaderTask {
    pub fn new(shared: Arc<Shared>, streams: Receiver<PlaybackStream>, chunks: Sender<PlaybackMessage>) -> Self {
        Self {
            shared,
            streams,
            chunks,
        }
    }

    pub fn run(self) {
        while !self.shared.is_shutdown() {
            match self.streams.recv_timeout(self.shared.config.supervisor_poll()) {
                Ok(stream) => self.stream_file(stream),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }

    fn stream_file(&self, mut stream: PlaybackStream) {
        self.shared.reader_cancel.store(false, Ordering::Release);
        let start = PlaybackMessage::Start {
            file_name: stream.name().to_string(),
            expected_samples: stream.expected_samples(),
        };
        if self.send(start).is_err() {
            self.shared.set_now_playing(None);
            self.shared.report_error(PipelineError::Timeout("playback task to accept stream"));
            self.shared.update_signals(Signals::PLAYBACK_DONE, Signals::PLAYING);
            return;
        }

        let mut chunks = 0usize;
        loop {
            let slot = match self.acquire_slot() {
                Ok(Some(slot)) => slot,
                Ok(None) => {
                    log::debug!("{}: stream cancelled after {} chunks", stream.name(), chunks);
                    return;
                }
                Err(e) => {
                    let _ = self.send(PlaybackMessage::Abort { reason: e });
                    return;
                }
            };

            let read = self.shared.playback.fill(slot, |buf| {
                let want = buf.len().min(stream.remaining());
                stream.read_samples(&mut buf[..want])
            });
            let sample_count = match read {
                Ok(count) => count,
                Err(e) => {
                    self.shared.playback.release_slot(slot);
                    let _ = self.send(PlaybackMessage::Abort { reason: e });
                    return;
                }
            };

            let is_last = stream.remaining() == 0;
            let chunk = AudioChunk {
                slot,
                sample_count,
                is_last,
            };
            if self.send(PlaybackMessage::Chunk(chunk)).is_err() {
                self.shared.playback.release_slot(slot);
                log::warn!("{}: playback stopped taking chunks", stream.name());
                return;
            }
            chunks += 1;
            log::trace!("{}: chunk {} ({:?}, {} samples)", stream.name(), chunks, slot, sample_count);

            if is_last {
                log::debug!(
                    "{}: {} of {} samples read in {} chunks",
                    stream.name(),
                    stream.samples_read(),
                    stream.expected_samples(),
                    chunks
                );
                return;
            }
        }
    }

    /// Wait for a free slot, re-polling so a cancel or shutdown is noticed.
    ///
    /// `Ok(None)` means the stream was cancelled.
    fn acquire_slot(&self) -> Result<Option<Slot>, PipelineError> {
        let poll = self.shared.config.drain_poll();
        for _ in 0..self.shared.config.drain_poll_limit {
            if self.shared.reader_cancel.load(Ordering::Acquire) || self.shared.is_shutdown() {
                return Ok(None);
            }
            if let Some(slot) = self.shared.playback.acquire_slot(poll) {
                return Ok(Some(slot));
            }
        }
        Err(PipelineError::Timeout("free playback slot"))
    }

    fn send(&self, message: PlaybackMessage) -> Result<(), PipelineError> {
        self.chunks
            .send_timeout(message, self.shared.config.chunk_send_timeout())
            .map_err(|_| PipelineError::Timeout("playback chunk handoff"))
    }
}

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;

use crate::models::error::PipelineError;

/// One of the two fixed playback chunk buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Ping,
    Pong,
}

impl Slot {
    fn index(self) -> usize {
        match self {
            Slot::Ping => 0,
            Slot::Pong => 1,
        }
    }

    pub fn other(self) -> Slot {
        match self {
            Slot::Ping => Slot::Pong,
            Slot::Pong => Slot::Ping,
        }
    }
}

/// A filled slot handed from the storage reader to the playback task.
///
/// The message refers to the slot; the samples stay in the buffer. The
/// receiver returns the slot with [`PlaybackBuffers::release_slot`] once
/// the sink has drained it. A zero-length chunk tagged `is_last` marks an
/// early end of stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioChunk {
    pub slot: Slot,
    pub sample_count: usize,
    pub is_last: bool,
}

#[derive(Debug, Clone, Copy)]
struct ActiveChunk {
    slot: Slot,
    offset: usize,
    remaining: usize,
    is_last: bool,
}

/// Fields the playback task and the sink interrupt update together.
#[derive(Debug, Default)]
struct PlaybackSession {
    active: bool,
    chunk: Option<ActiveChunk>,
}

/// Ping-pong chunk buffers shared by the reader, the playback task and the
/// sink interrupt.
///
/// Slot ownership moves through a free list: the reader takes a free slot,
/// fills it and sends it on as an [`AudioChunk`]; the playback task
/// publishes it, waits for the sink to drain it and puts it back. So at any
/// moment a slot has exactly one writer or one reader.
///
/// The sink side ([`on_ready_for_more`](Self::on_ready_for_more)) only ever
/// uses `try_lock`. If a critical section is held by a task it emits
/// silence for that quantum rather than waiting.
pub struct PlaybackBuffers {
    slots: [Mutex<Box<[i16]>>; 2],
    chunk_samples: usize,
    session: Mutex<PlaybackSession>,
    completed: AtomicBool,
    requests: AtomicU64,
    silence_quanta: AtomicU64,
    contended: AtomicU64,
    free_tx: Sender<Slot>,
    free_rx: Receiver<Slot>,
}

impl PlaybackBuffers {
    pub fn new(chunk_samples: usize) -> Self {
        let (free_tx, free_rx) = bounded(2);
        for slot in [Slot::Ping, Slot::Pong] {
            let _ = free_tx.try_send(slot);
        }
        Self {
            slots: [
                Mutex::new(vec![0; chunk_samples].into_boxed_slice()),
                Mutex::new(vec![0; chunk_samples].into_boxed_slice()),
            ],
            chunk_samples,
            session: Mutex::new(PlaybackSession::default()),
            completed: AtomicBool::new(false),
            requests: AtomicU64::new(0),
            silence_quanta: AtomicU64::new(0),
            contended: AtomicU64::new(0),
            free_tx,
            free_rx,
        }
    }

    /// Capacity of each slot in interleaved samples.
    pub fn chunk_samples(&self) -> usize {
        self.chunk_samples
    }

    /// Take a free slot, waiting up to `timeout`.
    pub fn acquire_slot(&self, timeout: Duration) -> Option<Slot> {
        self.free_rx.recv_timeout(timeout).ok()
    }

    /// Return a slot to the free list.
    pub fn release_slot(&self, slot: Slot) {
        if self.free_tx.try_send(slot).is_err() {
            log::warn!("playback slot {:?} released twice", slot);
        }
    }

    pub fn free_slots(&self) -> usize {
        self.free_rx.len()
    }

    /// Fill a slot the caller owns.
    pub fn fill<R>(&self, slot: Slot, fill: impl FnOnce(&mut [i16]) -> R) -> R {
        let mut buffer = self.slots[slot.index()].lock();
        fill(&mut buffer)
    }

    /// Start a playback session: clears the completion flag and any chunk.
    pub fn begin(&self) {
        let mut session = self.session.lock();
        session.active = true;
        session.chunk = None;
        self.completed.store(false, Ordering::Release);
    }

    /// Make `chunk` the one the sink drains.
    pub fn publish(&self, chunk: AudioChunk) -> Result<(), PipelineError> {
        if chunk.sample_count > self.chunk_samples {
            return Err(PipelineError::Internal(format!(
                "chunk of {} samples exceeds slot capacity {}",
                chunk.sample_count, self.chunk_samples
            )));
        }

        let mut session = self.session.lock();
        if chunk.sample_count == 0 {
            session.chunk = None;
            if chunk.is_last {
                session.active = false;
                self.completed.store(true, Ordering::Release);
            }
            return Ok(());
        }

        session.active = true;
        session.chunk = Some(ActiveChunk {
            slot: chunk.slot,
            offset: 0,
            remaining: chunk.sample_count,
            is_last: chunk.is_last,
        });
        Ok(())
    }

    /// Samples of the published chunk not yet handed to the sink.
    pub fn remaining(&self) -> usize {
        self.session.lock().chunk.map_or(0, |chunk| chunk.remaining)
    }

    pub fn is_active(&self) -> bool {
        self.session.lock().active
    }

    /// Whether the chunk tagged `is_last` has fully drained.
    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    /// Drop the published chunk and deactivate the session.
    pub fn reset(&self) {
        let mut session = self.session.lock();
        session.active = false;
        session.chunk = None;
    }

    /// Interrupt entry point: fill `out` with the next quantum.
    ///
    /// Returns the number of real samples written; the rest of `out` is
    /// zeroed. Never blocks and never reads outside the published chunk.
    pub fn on_ready_for_more(&self, out: &mut [i16]) -> usize {
        self.requests.fetch_add(1, Ordering::Relaxed);

        let mut written = 0;
        match self.session.try_lock() {
            None => {
                self.contended.fetch_add(1, Ordering::Relaxed);
            }
            Some(mut session) => {
                let drained = match session.chunk.as_mut() {
                    None => None,
                    Some(chunk) => match self.slots[chunk.slot.index()].try_lock() {
                        None => {
                            self.contended.fetch_add(1, Ordering::Relaxed);
                            None
                        }
                        Some(buffer) => {
                            let count = chunk.remaining.min(out.len());
                            match buffer.get(chunk.offset..chunk.offset + count) {
                                Some(source) => {
                                    out[..count].copy_from_slice(source);
                                    written = count;
                                    chunk.offset += count;
                                    chunk.remaining -= count;
                                }
                                None => chunk.remaining = 0,
                            }
                            (chunk.remaining == 0).then_some(chunk.is_last)
                        }
                    },
                };

                if let Some(is_last) = drained {
                    session.chunk = None;
                    if is_last {
                        session.active = false;
                        self.completed.store(true, Ordering::Release);
                    }
                }
            }
        }

        if written < out.len() {
            out[written..].fill(0);
            self.silence_quanta.fetch_add(1, Ordering::Relaxed);
        }
        written
    }

    /// (requests, silence quanta, contended requests)
    pub fn counters(&self) -> (u64, u64, u64) {
        (
            self.requests.load(Ordering::Relaxed),
            self.silence_quanta.load(Ordering::Relaxed),
            self.contended.load(Ordering::Relaxed),
        )
    }
}

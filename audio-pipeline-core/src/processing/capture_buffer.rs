use std::sync::atomic::{AtomicBool, AtomicI16, AtomicU64, AtomicUsize, Ordering};
use std::thread;

use super::pcm::PcmSource;

/// Fixed-capacity capture arena fed from the source interrupt context.
///
/// Allocated once for the life of the pipeline. A recording session is a
/// cursor over this arena:
///
/// ```text
/// arm()            cursor = 0, generation += 1, feed enabled
/// on_block_ready() appends whole frames at cursor (interrupt context)
/// disarm()         feed disabled, waits out an in-flight block, final count
/// view()/copy_*    read-only access for the storage writer task
/// ```
///
/// The interrupt side only ever touches atomics: it never blocks, allocates
/// or logs. Writes stop at capacity; the excess of a block is dropped and
/// counted as a hard overflow instead of wrapping.
pub struct CaptureBuffer {
    samples: Box<[AtomicI16]>,
    channels: usize,
    cursor: AtomicUsize,
    enabled: AtomicBool,
    in_block: AtomicBool,
    overflowed: AtomicBool,
    generation: AtomicU64,
    blocks: AtomicU64,
    hw_errors: AtomicU64,
    hard_overflows: AtomicU64,
}

/// Final state of a session, read after the feed is disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureSnapshot {
    pub generation: u64,
    pub sample_count: usize,
    /// At least one block hit the end of the arena.
    pub overflowed: bool,
    pub blocks: u64,
    pub hw_errors: u64,
    pub hard_overflows: u64,
}

impl CaptureBuffer {
    /// `capacity` is in interleaved samples and must be a whole number of frames.
    pub fn new(capacity: usize, channels: usize) -> Self {
        let channels = channels.max(1);
        let capacity = capacity - capacity % channels;
        Self {
            samples: (0..capacity).map(|_| AtomicI16::new(0)).collect(),
            channels,
            cursor: AtomicUsize::new(0),
            enabled: AtomicBool::new(false),
            in_block: AtomicBool::new(false),
            overflowed: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            blocks: AtomicU64::new(0),
            hw_errors: AtomicU64::new(0),
            hard_overflows: AtomicU64::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Current write cursor. Monotonic between `arm` and the next `arm`.
    pub fn cursor(&self) -> usize {
        self.cursor.load(Ordering::Acquire)
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn is_armed(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Reset the arena for a new session and enable the feed.
    ///
    /// Returns the new session generation.
    pub fn arm(&self) -> u64 {
        self.enabled.store(false, Ordering::SeqCst);
        self.wait_for_block_exit();

        self.cursor.store(0, Ordering::Release);
        self.overflowed.store(false, Ordering::Relaxed);
        self.blocks.store(0, Ordering::Relaxed);
        self.hw_errors.store(0, Ordering::Relaxed);
        self.hard_overflows.store(0, Ordering::Relaxed);
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;

        self.enabled.store(true, Ordering::SeqCst);
        generation
    }

    /// Disable the feed and return the final session state.
    ///
    /// Synchronous: when this returns, no block is in progress and the
    /// cursor will not move again until the next `arm`.
    pub fn disarm(&self) -> CaptureSnapshot {
        self.enabled.store(false, Ordering::SeqCst);
        self.wait_for_block_exit();
        self.snapshot()
    }

    pub fn snapshot(&self) -> CaptureSnapshot {
        CaptureSnapshot {
            generation: self.generation(),
            sample_count: self.cursor(),
            overflowed: self.overflowed.load(Ordering::Relaxed),
            blocks: self.blocks.load(Ordering::Relaxed),
            hw_errors: self.hw_errors.load(Ordering::Relaxed),
            hard_overflows: self.hard_overflows.load(Ordering::Relaxed),
        }
    }

    /// Interrupt entry point: append one block of interleaved samples.
    ///
    /// Returns the number of samples stored. Trailing partial frames are
    /// ignored. Does nothing while the feed is disabled.
    pub fn on_block_ready(&self, block: &[i16]) -> usize {
        self.in_block.store(true, Ordering::SeqCst);
        if !self.enabled.load(Ordering::SeqCst) {
            self.in_block.store(false, Ordering::Release);
            return 0;
        }

        self.blocks.fetch_add(1, Ordering::Relaxed);

        let start = self.cursor.load(Ordering::Relaxed);
        let whole = block.len() - block.len() % self.channels;
        let room = self.capacity().saturating_sub(start);
        let count = whole.min(room);

        if let Some(dest) = self.samples.get(start..start + count) {
            for (slot, &sample) in dest.iter().zip(block) {
                slot.store(sample, Ordering::Relaxed);
            }
            self.cursor.store(start + count, Ordering::Release);
        }

        if count < whole {
            self.overflowed.store(true, Ordering::Relaxed);
            self.hard_overflows.fetch_add(1, Ordering::Relaxed);
        }

        self.in_block.store(false, Ordering::Release);
        count
    }

    /// Interrupt entry point: a hardware overrun/underrun flag was cleared.
    pub fn on_hardware_error(&self) {
        self.hw_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy captured samples starting at `offset` into `out`.
    pub fn copy_samples(&self, offset: usize, out: &mut [i16]) -> usize {
        let end = self.cursor();
        if offset >= end {
            return 0;
        }
        let count = out.len().min(end - offset);
        for (dst, src) in out.iter_mut().zip(&self.samples[offset..offset + count]) {
            *dst = src.load(Ordering::Relaxed);
        }
        count
    }

    /// Read-only window over `len` captured samples starting at `offset`.
    pub fn view(&self, offset: usize, len: usize) -> CaptureView<'_> {
        let end = self.cursor();
        let offset = offset.min(end);
        CaptureView {
            buffer: self,
            offset,
            len: len.min(end - offset),
        }
    }

    fn wait_for_block_exit(&self) {
        while self.in_block.load(Ordering::SeqCst) {
            thread::yield_now();
        }
    }
}

/// Window over a finished capture, consumed by the storage writer.
pub struct CaptureView<'a> {
    buffer: &'a CaptureBuffer,
    offset: usize,
    len: usize,
}

impl PcmSource for CaptureView<'_> {
    fn sample_count(&self) -> usize {
        self.len
    }

    fn copy_samples(&self, offset: usize, out: &mut [i16]) -> usize {
        if offset >= self.len {
            return 0;
        }
        let count = out.len().min(self.len - offset);
        self.buffer.copy_samples(self.offset + offset, &mut out[..count])
    }
}

//! Timer-paced sink standing in for a speaker interface.
//!
//! Pulls one quantum per period through
//! [`PlaybackBuffers::on_ready_for_more`] and meters what it receives
//! instead of driving a DAC.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use audio_pipeline_core::{PipelineError, PlaybackBuffers, SampleSink};
use parking_lot::Mutex;

/// Running totals for everything the sink has played.
#[derive(Debug, Default)]
pub struct SinkMeter {
    peak: AtomicU64,
    samples_played: AtomicU64,
    quanta: AtomicU64,
}

impl SinkMeter {
    /// Largest absolute sample value seen since the last reset.
    pub fn peak(&self) -> u16 {
        self.peak.load(Ordering::Relaxed) as u16
    }

    /// Peak level in dBFS; `None` while only silence has played.
    pub fn peak_dbfs(&self) -> Option<f64> {
        match self.peak() {
            0 => None,
            peak => Some(20.0 * (peak as f64 / i16::MAX as f64).log10()),
        }
    }

    /// Real (non-silence) samples handed to the output.
    pub fn samples_played(&self) -> u64 {
        self.samples_played.load(Ordering::Relaxed)
    }

    pub fn quanta(&self) -> u64 {
        self.quanta.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.peak.store(0, Ordering::Relaxed);
        self.samples_played.store(0, Ordering::Relaxed);
        self.quanta.store(0, Ordering::Relaxed);
    }

    fn record(&self, real: &[i16]) {
        self.quanta.fetch_add(1, Ordering::Relaxed);
        if real.is_empty() {
            return;
        }
        let peak = real.iter().map(|s| s.unsigned_abs()).max().unwrap_or(0);
        self.peak.fetch_max(peak as u64, Ordering::Relaxed);
        self.samples_played.fetch_add(real.len() as u64, Ordering::Relaxed);
    }
}

pub struct PacedSink {
    quantum_samples: usize,
    period: Duration,
    meter: Arc<SinkMeter>,
    running: Arc<AtomicBool>,
    render_handle: Mutex<Option<JoinHandle<()>>>,
}

impl PacedSink {
    /// A sink requesting `quantum_frames` frames of `channels` samples every
    /// quantum period at `sample_rate`.
    pub fn new(sample_rate: u32, channels: u16, quantum_frames: usize) -> Self {
        let rate = sample_rate.max(1) as u64;
        Self {
            quantum_samples: quantum_frames * channels as usize,
            period: Duration::from_nanos(quantum_frames as u64 * 1_000_000_000 / rate),
            meter: Arc::new(SinkMeter::default()),
            running: Arc::new(AtomicBool::new(false)),
            render_handle: Mutex::new(None),
        }
    }

    pub fn meter(&self) -> Arc<SinkMeter> {
        Arc::clone(&self.meter)
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

impl SampleSink for PacedSink {
    fn start(&mut self, feed: Arc<PlaybackBuffers>) -> Result<(), PipelineError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(PipelineError::Internal("sink already running".into()));
        }
        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let meter = Arc::clone(&self.meter);
        let quantum = self.quantum_samples;
        let period = self.period;

        let handle = thread::Builder::new()
            .name("paced-sink".into())
            .spawn(move || {
                let mut out = vec![0i16; quantum];
                let mut deadline = Instant::now();
                while running.load(Ordering::SeqCst) {
                    let written = feed.on_ready_for_more(&mut out);
                    meter.record(&out[..written]);

                    deadline += period;
                    let now = Instant::now();
                    if deadline > now {
                        thread::sleep(deadline - now);
                    } else {
                        deadline = now;
                    }
                }
            })
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                PipelineError::Internal(format!("failed to spawn sink thread: {}", e))
            })?;

        *self.render_handle.lock() = Some(handle);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), PipelineError> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.render_handle.lock().take() {
            if handle.join().is_err() {
                return Err(PipelineError::Internal("sink thread panicked".into()));
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "paced"
    }
}

impl Drop for PacedSink {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use audio_pipeline_core::AudioChunk;

    #[test]
    fn drains_a_published_chunk_and_meters_it() {
        let buffers = Arc::new(PlaybackBuffers::new(256));
        buffers.begin();
        let slot = buffers.acquire_slot(Duration::from_millis(10)).unwrap();
        buffers.fill(slot, |buf| {
            for (i, s) in buf.iter_mut().enumerate() {
                *s = if i == 100 { -16_384 } else { 1_000 };
            }
        });
        buffers
            .publish(AudioChunk {
                slot,
                sample_count: 256,
                is_last: true,
            })
            .unwrap();

        let mut sink = PacedSink::new(16_000, 2, 32);
        let meter = sink.meter();
        sink.start(Arc::clone(&buffers)).unwrap();
        let deadline = Instant::now() + Duration::from_secs(2);
        while !buffers.is_completed() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        sink.stop().unwrap();

        assert!(buffers.is_completed());
        assert_eq!(meter.samples_played(), 256);
        assert_eq!(meter.peak(), 16_384);
        assert!(meter.quanta() >= 4);
        buffers.release_slot(slot);
        assert_eq!(buffers.free_slots(), 2);
    }

    #[test]
    fn idle_sink_plays_silence() {
        let buffers = Arc::new(PlaybackBuffers::new(64));
        let mut sink = PacedSink::new(16_000, 2, 32);
        let meter = sink.meter();
        sink.start(Arc::clone(&buffers)).unwrap();
        thread::sleep(Duration::from_millis(20));
        sink.stop().unwrap();

        assert!(meter.quanta() > 0);
        assert_eq!(meter.samples_played(), 0);
        assert_eq!(meter.peak_dbfs(), None);
        let (requests, silence, _) = buffers.counters();
        assert_eq!(requests, meter.quanta());
        assert_eq!(silence, requests);
    }

    #[test]
    fn peak_level_in_dbfs() {
        let meter = SinkMeter::default();
        meter.record(&[0, i16::MAX / 2, -3]);
        assert_relative_eq!(meter.peak_dbfs().unwrap(), -6.0206, epsilon = 1e-3);
        meter.reset();
        assert_eq!(meter.peak(), 0);
    }

    #[test]
    fn period_matches_quantum() {
        assert_eq!(PacedSink::new(16_000, 2, 32).period(), Duration::from_millis(2));
    }
}

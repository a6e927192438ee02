//! Timer-paced sine generator standing in for a microphone interface.
//!
//! A dedicated thread produces one block of interleaved samples per block
//! period and hands it to [`CaptureBuffer::on_block_ready`], the same call a
//! hardware "block ready" interrupt would make.

use std::f64::consts::TAU;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use audio_pipeline_core::{CaptureBuffer, PipelineError, SampleSource};
use parking_lot::Mutex;

/// Shape of the generated signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneSettings {
    pub sample_rate: u32,
    pub channels: u16,
    pub block_frames: usize,
    pub frequency_hz: f64,
    /// Peak level, 0.0 to 1.0 of full scale.
    pub amplitude: f64,
}

impl Default for ToneSettings {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            channels: 2,
            block_frames: 32,
            frequency_hz: 440.0,
            amplitude: 0.5,
        }
    }
}

pub struct ToneSource {
    settings: ToneSettings,
    running: Arc<AtomicBool>,
    capture_handle: Mutex<Option<JoinHandle<()>>>,
}

impl ToneSource {
    pub fn new(settings: ToneSettings) -> Self {
        Self {
            settings,
            running: Arc::new(AtomicBool::new(false)),
            capture_handle: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> &ToneSettings {
        &self.settings
    }

    pub fn block_period(&self) -> Duration {
        let rate = self.settings.sample_rate.max(1) as u64;
        Duration::from_nanos(self.settings.block_frames as u64 * 1_000_000_000 / rate)
    }
}

impl SampleSource for ToneSource {
    fn start(&mut self, feed: Arc<CaptureBuffer>) -> Result<(), PipelineError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(PipelineError::Internal("tone source already running".into()));
        }
        if feed.channels() != self.settings.channels as usize {
            return Err(PipelineError::UnsupportedParameters(format!(
                "tone has {} channels, capture expects {}",
                self.settings.channels,
                feed.channels()
            )));
        }

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let settings = self.settings;
        let period = self.block_period();

        let handle = thread::Builder::new()
            .name("tone-source".into())
            .spawn(move || {
                tone_loop(&running, &settings, period, &feed);
                running.store(false, Ordering::SeqCst);
            })
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                PipelineError::Internal(format!("failed to spawn tone thread: {}", e))
            })?;

        *self.capture_handle.lock() = Some(handle);
        log::debug!("{} started ({:?} blocks)", self.name(), period);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), PipelineError> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.capture_handle.lock().take() {
            if handle.join().is_err() {
                return Err(PipelineError::Internal("tone thread panicked".into()));
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "tone"
    }
}

impl Drop for ToneSource {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

fn tone_loop(running: &AtomicBool, settings: &ToneSettings, period: Duration, feed: &CaptureBuffer) {
    let channels = settings.channels as usize;
    let step = TAU * settings.frequency_hz / settings.sample_rate as f64;
    let peak = settings.amplitude.clamp(0.0, 1.0) * i16::MAX as f64;
    let mut block = vec![0i16; settings.block_frames * channels];
    let mut phase = 0.0f64;
    let mut deadline = Instant::now();

    while running.load(Ordering::SeqCst) {
        for frame in block.chunks_exact_mut(channels) {
            frame.fill((phase.sin() * peak) as i16);
            phase = (phase + step) % TAU;
        }
        feed.on_block_ready(&block);

        deadline += period;
        let now = Instant::now();
        if deadline > now {
            thread::sleep(deadline - now);
        } else {
            // Fell behind; resynchronise instead of bursting.
            deadline = now;
        }
    }
}

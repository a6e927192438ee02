use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::signals::{SignalSet, Signals};
use crate::models::audio_models::PipelineDiagnostics;
use crate::models::config::PipelineConfig;
use crate::models::error::PipelineError;
use crate::models::recording_result::{PlaybackReport, RecordingResult, RecordingSummary};
use crate::models::state::ControllerState;
use crate::processing::capture_buffer::CaptureBuffer;
use crate::processing::playback_buffers::PlaybackBuffers;
use crate::traits::file_service::FileService;
use crate::traits::observer::PipelineObserver;

#[derive(Default)]
struct Records {
    last_error: Option<PipelineError>,
    last_recording: Option<RecordingSummary>,
    last_saved: Option<RecordingResult>,
    last_playback: Option<PlaybackReport>,
    now_playing: Option<String>,
}

/// State shared by every pipeline task.
pub struct Shared {
    pub config: PipelineConfig,
    pub signals: SignalSet,
    pub capture: Arc<CaptureBuffer>,
    pub playback: Arc<PlaybackBuffers>,
    pub fs: Arc<dyn FileService>,
    pub observer: Arc<dyn PipelineObserver>,
    /// Set by the playback task to stop the reader mid-stream.
    pub reader_cancel: AtomicBool,
    shutdown: AtomicBool,
    records: Mutex<Records>,
    /// Last state reported to the observer. Held while notifying so
    /// notifications arrive in order.
    reported: Mutex<ControllerState>,
}

impl Shared {
    pub fn new(
        config: PipelineConfig,
        fs: Arc<dyn FileService>,
        observer: Arc<dyn PipelineObserver>,
    ) -> Self {
        let capture = Arc::new(CaptureBuffer::new(config.capture_capacity, config.channels as usize));
        let playback = Arc::new(PlaybackBuffers::new(config.playback_chunk_samples));
        Self {
            config,
            signals: SignalSet::new(Signals::IDLE),
            capture,
            playback,
            fs,
            observer,
            reader_cancel: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
            records: Mutex::new(Records::default()),
            reported: Mutex::new(ControllerState::Idle),
        }
    }

    pub fn state(&self) -> ControllerState {
        ControllerState::from_signals(self.signals.get())
    }

    /// Set and clear signals, keep IDLE consistent, and notify the observer
    /// if the visible state changed.
    pub fn update_signals(&self, set: Signals, clear: Signals) -> Signals {
        let mut reported = self.reported.lock();
        let signals = self.signals.modify(|current| {
            let next = current.without(clear).with(set);
            if next.intersects(Signals::ACTIVE) {
                next.without(Signals::IDLE)
            } else {
                next.with(Signals::IDLE)
            }
        });

        let state = ControllerState::from_signals(signals);
        if *reported != state {
            log::debug!("state {} -> {}", *reported, state);
            *reported = state;
            self.observer.on_state_changed(state);
        }
        signals
    }

    /// Record a session-fatal error and raise ERROR.
    pub fn report_error(&self, error: PipelineError) {
        log::error!("{}", error);
        self.observer.on_error(&error);
        self.records.lock().last_error = Some(error);
        self.update_signals(Signals::ERROR, Signals::NONE);
    }

    /// Log and forward a non-fatal condition without changing state.
    pub fn report_warning(&self, warning: &PipelineError) {
        log::warn!("{}", warning);
        self.observer.on_error(warning);
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.reader_cancel.store(true, Ordering::Release);
        self.signals.set(Signals::NONE);
    }

    pub fn last_error(&self) -> Option<PipelineError> {
        self.records.lock().last_error.clone()
    }

    pub fn last_recording(&self) -> Option<RecordingSummary> {
        self.records.lock().last_recording.clone()
    }

    pub fn set_last_recording(&self, summary: RecordingSummary) {
        self.records.lock().last_recording = Some(summary);
    }

    pub fn last_saved(&self) -> Option<RecordingResult> {
        self.records.lock().last_saved.clone()
    }

    pub fn set_last_saved(&self, result: RecordingResult) {
        self.records.lock().last_saved = Some(result);
    }

    pub fn last_playback(&self) -> Option<PlaybackReport> {
        self.records.lock().last_playback.clone()
    }

    pub fn set_last_playback(&self, report: PlaybackReport) {
        self.records.lock().last_playback = Some(report);
    }

    pub fn now_playing(&self) -> Option<String> {
        self.records.lock().now_playing.clone()
    }

    pub fn set_now_playing(&self, name: Option<String>) {
        self.records.lock().now_playing = name;
    }

    pub fn diagnostics(&self) -> PipelineDiagnostics {
        let capture = self.capture.snapshot();
        let (sink_requests, sink_silence_quanta, sink_contended) = self.playback.counters();
        PipelineDiagnostics {
            capture_blocks: capture.blocks,
            capture_hw_errors: capture.hw_errors,
            capture_hard_overflows: capture.hard_overflows,
            sink_requests,
            sink_silence_quanta,
            sink_contended,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryFileService;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct StateLog {
        changes: Mutex<Vec<ControllerState>>,
        errors: AtomicUsize,
    }

    impl PipelineObserver for StateLog {
        fn on_state_changed(&self, state: ControllerState) {
            self.changes.lock().push(state);
        }
        fn on_error(&self, _error: &PipelineError) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn shared(observer: Arc<StateLog>) -> Shared {
        Shared::new(PipelineConfig::default(), Arc::new(MemoryFileService::new()), observer)
    }

    #[test]
    fn idle_tracks_active_signals() {
        let shared = shared(Arc::default());
        let s = shared.update_signals(Signals::RECORDING, Signals::NONE);
        assert!(!s.contains(Signals::IDLE));

        let s = shared.update_signals(Signals::WRITING, Signals::RECORDING);
        assert!(!s.contains(Signals::IDLE));

        let s = shared.update_signals(Signals::NONE, Signals::WRITING);
        assert!(s.contains(Signals::IDLE));
    }

    #[test]
    fn concurrent_updates_report_states_in_order() {
        let log = Arc::new(StateLog::default());
        let shared = Arc::new(shared(log.clone()));

        let workers: Vec<_> = [Signals::RECORDING, Signals::WRITING]
            .into_iter()
            .map(|bit| {
                let shared = Arc::clone(&shared);
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        shared.update_signals(bit, Signals::NONE);
                        shared.update_signals(Signals::NONE, bit);
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let changes = log.changes.lock();
        assert!(changes.windows(2).all(|pair| pair[0] != pair[1]));
        assert_eq!(changes.last().copied(), Some(ControllerState::Idle));
        assert_eq!(shared.state(), ControllerState::Idle);
    }

    #[test]
    fn observer_sees_each_change_once() {
        let log = Arc::new(StateLog::default());
        let shared = shared(log.clone());
        shared.update_signals(Signals::RECORDING, Signals::NONE);
        shared.update_signals(Signals::STOP_REQUESTED, Signals::NONE);
        shared.update_signals(Signals::RECORDING_DONE, Signals::RECORDING | Signals::STOP_REQUESTED);

        assert_eq!(
            *log.changes.lock(),
            vec![ControllerState::Recording, ControllerState::Idle]
        );
    }

    #[test]
    fn errors_raise_error_state_but_warnings_do_not() {
        let log = Arc::new(StateLog::default());
        let shared = shared(log.clone());

        shared.report_warning(&PipelineError::CaptureOverflow);
        assert_eq!(shared.state(), ControllerState::Idle);

        shared.report_error(PipelineError::HandoffTimeout);
        assert_eq!(shared.state(), ControllerState::Error);
        assert_eq!(shared.last_error(), Some(PipelineError::HandoffTimeout));
        assert_eq!(log.errors.load(Ordering::SeqCst), 2);
    }
}

use std::sync::Arc;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use super::shared::Shared;
use super::signals::Signals;
use crate::models::error::PipelineError;
use crate::models::recording_result::{CompletedCapture, RecordingSummary};
use crate::models::state::SupervisorState;
use crate::traits::sample_source::SampleSource;

/// Request from the session controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorRequest {
    Start,
}

/// Recording supervisor task.
///
/// Drives one capture session at a time through
/// `Idle → Armed → Capturing → Flushing → Idle`. A session ends on
/// `STOP_REQUESTED` or when the cursor reaches `capacity - reserved_margin`;
/// both paths flush the same way and differ only in `overflowed`.
pub struct RecordingSupervisor {
    shared: Arc<Shared>,
    source: Box<dyn SampleSource>,
    requests: Receiver<SupervisorRequest>,
    handoff: Sender<CompletedCapture>,
    state: SupervisorState,
}

impl RecordingSupervisor {
    pub fn new(
        shared: Arc<Shared>,
        source: Box<dyn SampleSource>,
        requests: Receiver<SupervisorRequest>,
        handoff: Sender<CompletedCapture>,
    ) -> Self {
        Self {
            shared,
            source,
            requests,
            handoff,
            state: SupervisorState::Idle,
        }
    }

    pub fn run(mut self) {
        log::debug!("recording supervisor started ({})", self.source.name());
        while !self.shared.is_shutdown() {
            match self.requests.recv_timeout(self.shared.config.supervisor_poll()) {
                Ok(SupervisorRequest::Start) => self.run_session(),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        log::debug!("recording supervisor stopped");
    }

    fn run_session(&mut self) {
        let shared = Arc::clone(&self.shared);
        let capture = Arc::clone(&shared.capture);

        self.transition(SupervisorState::Armed);
        let session_id = capture.arm();
        if let Err(e) = self.source.start(Arc::clone(&capture)) {
            let snapshot = capture.disarm();
            shared.report_error(e.clone());
            self.finish(RecordingSummary {
                session_id,
                sample_count: snapshot.sample_count,
                overflowed: false,
                hard_overflows: snapshot.hard_overflows,
                error: Some(e),
            });
            return;
        }
        self.transition(SupervisorState::Capturing);
        log::info!("recording session {} started", session_id);

        let limit = capture.capacity() - shared.config.reserved_margin;
        let auto_stop = loop {
            if shared.signals.get().contains(Signals::STOP_REQUESTED) || shared.is_shutdown() {
                break false;
            }
            if capture.cursor() >= limit {
                break true;
            }
            shared
                .signals
                .wait_any(Signals::STOP_REQUESTED, shared.config.supervisor_poll(), false);
        };

        self.transition(SupervisorState::Flushing);
        let snapshot = capture.disarm();
        if let Err(e) = self.source.stop() {
            shared.report_warning(&e);
        }
        if auto_stop {
            shared.report_warning(&PipelineError::CaptureOverflow);
        }
        if snapshot.hw_errors > 0 {
            log::warn!("{} hardware errors cleared during capture", snapshot.hw_errors);
        }

        let completed = CompletedCapture {
            session_id: snapshot.generation,
            sample_count: snapshot.sample_count,
            overflowed: auto_stop,
            format: shared.config.format(),
        };

        // WRITING goes up before the send so the writer can never clear it
        // ahead of us.
        shared.update_signals(Signals::WRITING, Signals::NONE);
        let error = match self.handoff.send_timeout(completed, shared.config.handoff_timeout()) {
            Ok(()) => None,
            Err(_) => {
                shared.update_signals(Signals::NONE, Signals::WRITING);
                shared.report_error(PipelineError::HandoffTimeout);
                Some(PipelineError::HandoffTimeout)
            }
        };

        log::info!(
            "recording session {} stopped: {} samples{}",
            session_id,
            snapshot.sample_count,
            if auto_stop { " (buffer full)" } else { "" }
        );
        self.finish(RecordingSummary {
            session_id,
            sample_count: snapshot.sample_count,
            overflowed: auto_stop,
            hard_overflows: snapshot.hard_overflows,
            error,
        });
    }

    fn finish(&mut self, summary: RecordingSummary) {
        self.shared.set_last_recording(summary);
        self.shared.update_signals(
            Signals::RECORDING_DONE,
            Signals::RECORDING | Signals::STOP_REQUESTED,
        );
        self.transition(SupervisorState::Idle);
    }

    fn transition(&mut self, next: SupervisorState) {
        log::trace!("supervisor {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::PipelineConfig;
    use crate::processing::capture_buffer::CaptureBuffer;
    use crate::storage::memory::MemoryFileService;
    use crate::traits::observer::NoopObserver;
    use crossbeam_channel::bounded;
    use parking_lot::Mutex;
    use std::thread;
    use std::time::Duration;

    /// Source whose feed the test drives by hand.
    #[derive(Clone, Default)]
    struct ManualSource {
        feed: Arc<Mutex<Option<Arc<CaptureBuffer>>>>,
    }

    impl SampleSource for ManualSource {
        fn start(&mut self, feed: Arc<CaptureBuffer>) -> Result<(), PipelineError> {
            *self.feed.lock() = Some(feed);
            Ok(())
        }
        fn stop(&mut self) -> Result<(), PipelineError> {
            *self.feed.lock() = None;
            Ok(())
        }
        fn name(&self) -> &str {
            "manual"
        }
    }

    fn config() -> PipelineConfig {
        PipelineConfig {
            capture_capacity: 256,
            reserved_margin: 16,
            supervisor_poll_ms: 5,
            ..Default::default()
        }
    }

    fn spawn(
        config: PipelineConfig,
        handoff_len: usize,
    ) -> (Arc<Shared>, ManualSource, Sender<SupervisorRequest>, Receiver<CompletedCapture>) {
        let shared = Arc::new(Shared::new(
            config,
            Arc::new(MemoryFileService::new()),
            Arc::new(NoopObserver),
        ));
        let source = ManualSource::default();
        let (req_tx, req_rx) = bounded(1);
        let (handoff_tx, handoff_rx) = bounded(handoff_len);
        let supervisor = RecordingSupervisor::new(shared.clone(), Box::new(source.clone()), req_rx, handoff_tx);
        thread::spawn(move || supervisor.run());
        (shared, source, req_tx, handoff_rx)
    }

    fn start(shared: &Shared, requests: &Sender<SupervisorRequest>, source: &ManualSource) {
        shared.update_signals(Signals::RECORDING, Signals::RECORDING_DONE);
        requests.send(SupervisorRequest::Start).unwrap();
        for _ in 0..500 {
            if source.feed.lock().is_some() {
                return;
            }
            thread::sleep(Duration::from_millis(1));
        }
        panic!("source never started");
    }

    fn push(source: &ManualSource, block: &[i16]) -> usize {
        source.feed.lock().as_ref().map_or(0, |feed| feed.on_block_ready(block))
    }

    #[test]
    fn user_stop_hands_off_without_overflow() {
        let (shared, source, requests, handoff) = spawn(config(), 2);
        start(&shared, &requests, &source);
        push(&source, &[1; 64]);

        shared.update_signals(Signals::STOP_REQUESTED, Signals::NONE);
        let done = shared.signals.wait_any(Signals::RECORDING_DONE, Duration::from_secs(5), false);
        assert!(done.is_some());

        let completed = handoff.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(completed.sample_count, 64);
        assert!(!completed.overflowed);

        let signals = shared.signals.get();
        assert!(signals.contains(Signals::WRITING));
        assert!(!signals.intersects(Signals::RECORDING | Signals::STOP_REQUESTED));
        shared.request_shutdown();
    }

    #[test]
    fn auto_stop_fires_once_at_margin() {
        let (shared, source, requests, handoff) = spawn(config(), 2);
        start(&shared, &requests, &source);
        while push(&source, &[2; 32]) > 0 {}

        let done = shared.signals.wait_any(Signals::RECORDING_DONE, Duration::from_secs(5), false);
        assert!(done.is_some());
        let completed = handoff.recv_timeout(Duration::from_secs(1)).unwrap();
        assert!(completed.overflowed);
        assert!(completed.sample_count >= 256 - 16);
        assert!(completed.sample_count <= 256);
        assert!(handoff.recv_timeout(Duration::from_millis(50)).is_err());

        let summary = shared.last_recording().unwrap();
        assert!(summary.overflowed);
        assert_eq!(summary.error, None);
        shared.request_shutdown();
    }

    #[test]
    fn full_handoff_drops_capture_and_raises_error() {
        let cfg = PipelineConfig {
            handoff_timeout_ms: 10,
            ..config()
        };
        let (shared, source, requests, handoff) = spawn(cfg, 1);

        for _ in 0..2 {
            start(&shared, &requests, &source);
            push(&source, &[3; 8]);
            shared.update_signals(Signals::STOP_REQUESTED, Signals::NONE);
            shared
                .signals
                .wait_any(Signals::RECORDING_DONE, Duration::from_secs(5), false)
                .unwrap();
        }

        let summary = shared.last_recording().unwrap();
        assert_eq!(summary.error, Some(PipelineError::HandoffTimeout));
        assert_eq!(shared.last_error(), Some(PipelineError::HandoffTimeout));
        assert!(shared.signals.get().contains(Signals::ERROR));
        assert_eq!(handoff.len(), 1);
        shared.request_shutdown();
    }
}

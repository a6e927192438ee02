use crate::models::error::PipelineError;
use crate::models::recording_result::{PlaybackReport, RecordingResult};
use crate::models::state::ControllerState;

/// Event observer for pipeline notifications.
///
/// All methods are called from pipeline task threads, never from the
/// interrupt entry points. Every method has an empty default so observers
/// implement only what they need.
pub trait PipelineObserver: Send + Sync {
    /// Called when the externally visible state changes.
    fn on_state_changed(&self, _state: ControllerState) {}

    /// Called for session-fatal errors and for warnings such as auto-stop.
    fn on_error(&self, _error: &PipelineError) {}

    /// Called when the storage writer task has persisted a recording.
    fn on_recording_saved(&self, _result: &RecordingResult) {}

    /// Called when a playback stream ends, complete or not.
    fn on_playback_finished(&self, _report: &PlaybackReport) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

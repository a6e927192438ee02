use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::bounded;

use super::controller::{CommandSender, SessionController};
use super::playback::PlaybackTask;
use super::reader::StorageReaderTask;
use super::shared::Shared;
use super::signals::Signals;
use super::supervisor::RecordingSupervisor;
use super::writer_task::StorageWriterTask;
use crate::models::audio_models::PipelineDiagnostics;
use crate::models::config::PipelineConfig;
use crate::models::error::PipelineError;
use crate::models::recording_result::{PlaybackReport, RecordingResult, RecordingSummary};
use crate::models::state::ControllerState;
use crate::storage::naming::{FilenamePolicy, SequentialNames};
use crate::storage::wav_writer::WavWriter;
use crate::traits::file_service::FileService;
use crate::traits::observer::{NoopObserver, PipelineObserver};
use crate::traits::power::{NoPowerPolicy, PowerPolicy};
use crate::traits::sample_sink::SampleSink;
use crate::traits::sample_source::SampleSource;

/// Builder for [`Pipeline`].
///
/// ```text
/// [SampleSource] → CaptureBuffer → supervisor ─handoff→ writer task → FileService
/// FileService → reader task ─chunks→ playback task → PlaybackBuffers → [SampleSink]
///                 commands → controller (arms supervisor / reader)
/// ```
pub struct PipelineBuilder {
    config: PipelineConfig,
    fs: Arc<dyn FileService>,
    source: Box<dyn SampleSource>,
    sink: Box<dyn SampleSink>,
    naming: Box<dyn FilenamePolicy>,
    observer: Arc<dyn PipelineObserver>,
    power: Arc<dyn PowerPolicy>,
}

impl PipelineBuilder {
    pub fn new(
        config: PipelineConfig,
        fs: Arc<dyn FileService>,
        source: Box<dyn SampleSource>,
        sink: Box<dyn SampleSink>,
    ) -> Self {
        Self {
            config,
            fs,
            source,
            sink,
            naming: Box::new(SequentialNames::default()),
            observer: Arc::new(NoopObserver),
            power: Arc::new(NoPowerPolicy),
        }
    }

    pub fn with_naming(mut self, naming: Box<dyn FilenamePolicy>) -> Self {
        self.naming = naming;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_power_policy(mut self, power: Arc<dyn PowerPolicy>) -> Self {
        self.power = power;
        self
    }

    /// Validate the configuration and start every task.
    pub fn build(self) -> Result<Pipeline, PipelineError> {
        self.config.validate()?;
        let config = self.config;

        let (command_tx, command_rx) = bounded(config.command_queue_len);
        let (supervisor_tx, supervisor_rx) = bounded(1);
        let (handoff_tx, handoff_rx) = bounded(config.handoff_queue_len);
        let (stream_tx, stream_rx) = bounded(1);
        // Start plus one chunk per slot.
        let (chunk_tx, chunk_rx) = bounded(3);

        let writer = WavWriter::new(Arc::clone(&self.fs), self.power, config.write_chunk_bytes);
        let shared = Arc::new(Shared::new(config, self.fs, self.observer));

        let supervisor = RecordingSupervisor::new(Arc::clone(&shared), self.source, supervisor_rx, handoff_tx);
        let writer_task = StorageWriterTask::new(Arc::clone(&shared), writer, self.naming, handoff_rx);
        let reader = StorageReaderTask::new(Arc::clone(&shared), stream_rx, chunk_tx);
        let playback = PlaybackTask::new(Arc::clone(&shared), self.sink, chunk_rx);
        let controller = SessionController::new(Arc::clone(&shared), supervisor_tx, stream_tx, command_rx);

        let mut pipeline = Pipeline {
            shared,
            commands: CommandSender::new(command_tx),
            handles: Vec::new(),
        };
        pipeline.spawn("audio-supervisor", move || supervisor.run())?;
        pipeline.spawn("audio-writer", move || writer_task.run())?;
        pipeline.spawn("audio-reader", move || reader.run())?;
        pipeline.spawn("audio-playback", move || playback.run())?;
        pipeline.spawn("audio-controller", move || controller.run())?;

        log::info!(
            "pipeline started: {} Hz, {} ch, {} bit, {} sample arena",
            pipeline.shared.config.sample_rate,
            pipeline.shared.config.channels,
            pipeline.shared.config.bits_per_sample,
            pipeline.shared.config.capture_capacity
        );
        Ok(pipeline)
    }
}

/// A running record/store/playback pipeline.
///
/// Dropping the pipeline shuts every task down.
pub struct Pipeline {
    shared: Arc<Shared>,
    commands: CommandSender,
    handles: Vec<JoinHandle<()>>,
}

impl Pipeline {
    pub fn commands(&self) -> CommandSender {
        self.commands.clone()
    }

    pub fn state(&self) -> ControllerState {
        self.shared.state()
    }

    pub fn signals(&self) -> Signals {
        self.shared.signals.get()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.shared.config
    }

    /// Wait up to `timeout` for any of `bits`.
    pub fn wait_for(&self, bits: Signals, timeout: Duration) -> Option<Signals> {
        self.shared.signals.wait_any(bits, timeout, false)
    }

    /// Wait up to `timeout` for the pipeline to reach IDLE.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.wait_for(Signals::IDLE, timeout).is_some()
    }

    pub fn last_error(&self) -> Option<PipelineError> {
        self.shared.last_error()
    }

    pub fn last_recording(&self) -> Option<RecordingSummary> {
        self.shared.last_recording()
    }

    pub fn last_saved(&self) -> Option<RecordingResult> {
        self.shared.last_saved()
    }

    pub fn last_playback(&self) -> Option<PlaybackReport> {
        self.shared.last_playback()
    }

    pub fn diagnostics(&self) -> PipelineDiagnostics {
        self.shared.diagnostics()
    }

    /// Stop every task and wait for them to exit.
    pub fn shutdown(&mut self) {
        if self.handles.is_empty() {
            return;
        }
        self.shared.request_shutdown();
        for handle in self.handles.drain(..) {
            let name = handle.thread().name().unwrap_or("audio-task").to_string();
            if handle.join().is_err() {
                log::error!("{} panicked", name);
            }
        }
        log::info!("pipeline stopped");
    }

    fn spawn(&mut self, name: &str, task: impl FnOnce() + Send + 'static) -> Result<(), PipelineError> {
        match thread::Builder::new().name(name.to_string()).spawn(task) {
            Ok(handle) => {
                self.handles.push(handle);
                Ok(())
            }
            Err(e) => {
                self.shutdown();
                Err(PipelineError::Internal(format!("failed to spawn {}: {}", name, e)))
            }
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

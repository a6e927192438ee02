//! Wires the desktop collaborators into a running pipeline.

use std::fs;
use std::sync::Arc;

use audio_pipeline_core::{
    ControllerState, FilenamePolicy, Pipeline, PipelineBuilder, PipelineError, PipelineObserver, PlaybackReport,
    RecordingResult, SequentialNames, TimestampNames,
};

use crate::config_file::HostConfig;
use crate::dir_file_service::DirFileService;
use crate::paced_sink::{PacedSink, SinkMeter};
use crate::tone_source::{ToneSettings, ToneSource};

/// Observer that reports pipeline events through the log.
#[derive(Debug, Default)]
pub struct LogObserver;

impl PipelineObserver for LogObserver {
    fn on_state_changed(&self, state: ControllerState) {
        log::info!("state: {}", state);
    }

    fn on_recording_saved(&self, result: &RecordingResult) {
        log::info!(
            "saved {} ({:.2} s, {} bytes, sha256 {})",
            result.file_name,
            result.duration_secs,
            result.data_bytes,
            result.checksum
        );
    }

    fn on_playback_finished(&self, report: &PlaybackReport) {
        log::info!(
            "played {}: {} of {} samples",
            report.file_name,
            report.samples_played,
            report.expected_samples
        );
    }
}

/// A pipeline plus the handles the console reports from.
pub struct Recorder {
    pub pipeline: Pipeline,
    pub meter: Arc<SinkMeter>,
    pub storage: Arc<DirFileService>,
}

impl Recorder {
    /// Create the storage directory if needed and start every task.
    pub fn start(config: &HostConfig) -> Result<Self, PipelineError> {
        fs::create_dir_all(&config.storage_dir).map_err(|e| {
            PipelineError::StorageOpenFailed(format!("{}: {}", config.storage_dir.display(), e))
        })?;

        let mut storage = DirFileService::new(&config.storage_dir);
        if let Some(volume) = &config.volume {
            storage = storage.with_volume(volume.clone());
        }
        let storage = Arc::new(storage);

        let pipeline_config = config.pipeline.clone();
        let source = ToneSource::new(ToneSettings {
            sample_rate: pipeline_config.sample_rate,
            channels: pipeline_config.channels,
            block_frames: pipeline_config.source_block_frames,
            frequency_hz: config.tone_hz,
            amplitude: config.tone_amplitude,
        });
        let sink = PacedSink::new(
            pipeline_config.sample_rate,
            pipeline_config.channels,
            pipeline_config.sink_quantum_frames,
        );
        let meter = sink.meter();
        let naming: Box<dyn FilenamePolicy> = if config.timestamp_names {
            Box::new(TimestampNames::new())
        } else {
            Box::new(SequentialNames::default())
        };

        let pipeline = PipelineBuilder::new(pipeline_config, storage.clone(), Box::new(source), Box::new(sink))
            .with_naming(naming)
            .with_observer(Arc::new(LogObserver))
            .build()?;
        log::info!("storage volume at {}", config.storage_dir.display());

        Ok(Self {
            pipeline,
            meter,
            storage,
        })
    }
}

//! # audio-pipeline-core
//!
//! Platform-agnostic real-time record/store/playback pipeline.
//!
//! Captures interleaved PCM from an interrupt-fed source into a fixed arena,
//! persists finished captures as WAV files through an injected file service,
//! and streams stored files back out through ping-pong buffers drained by an
//! interrupt-fed sink. Platform backends implement `SampleSource`,
//! `SampleSink` and `FileService` and plug into `PipelineBuilder`.
//!
//! ## Architecture
//!
//! ```text
//! audio-pipeline-core (this crate)
//! ├── traits/       ← FileService, SampleSource, SampleSink, PipelineObserver, PowerPolicy
//! ├── models/       ← PipelineError, PipelineConfig, ControllerState, Command, results
//! ├── processing/   ← CaptureBuffer, PlaybackBuffers, WAV header codec, PCM codec
//! ├── storage/      ← WavWriter, PlaybackStream, filename policies, MemoryFileService
//! └── session/      ← signals, supervisor, writer/reader/playback tasks, controller, Pipeline
//! ```
//!
//! The two interrupt entry points are [`CaptureBuffer::on_block_ready`] and
//! [`PlaybackBuffers::on_ready_for_more`]. Neither blocks, allocates or logs.

pub mod models;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use models::audio_models::{AudioFormat, PipelineDiagnostics, MAX_SAMPLE_RATE};
pub use models::command::{Command, CommandReply, FileName, MAX_FILE_NAME_LEN};
pub use models::config::PipelineConfig;
pub use models::error::{FileServiceError, PipelineError};
pub use models::recording_result::{PlaybackReport, RecordingResult, RecordingSummary};
pub use models::state::ControllerState;
pub use processing::capture_buffer::CaptureBuffer;
pub use processing::playback_buffers::{AudioChunk, PlaybackBuffers, Slot};
pub use processing::wav_format::{ContainerHeader, WAV_HEADER_SIZE};
pub use session::controller::CommandSender;
pub use session::pipeline::{Pipeline, PipelineBuilder};
pub use session::signals::Signals;
pub use storage::memory::MemoryFileService;
pub use storage::naming::{FilenamePolicy, SequentialNames, TimestampNames};
pub use storage::wav_reader::{open_for_playback, PlaybackStream};
pub use storage::wav_writer::{SavedFile, WavWriter};
pub use traits::file_service::{FileEntry, FileHandle, FileService, OpenMode};
pub use traits::observer::{NoopObserver, PipelineObserver};
pub use traits::power::{IdleLease, NoPowerPolicy, PowerPolicy};
pub use traits::sample_sink::SampleSink;
pub use traits::sample_source::SampleSource;

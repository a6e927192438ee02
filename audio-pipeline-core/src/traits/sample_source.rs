use std::sync::Arc;

use crate::models::error::PipelineError;
use crate::processing::capture_buffer::CaptureBuffer;

/// Microphone-side peripheral feed.
///
/// Once started, the implementation calls
/// [`CaptureBuffer::on_block_ready`] from its interrupt context (or a
/// thread standing in for one) every time the hardware has a block of
/// interleaved samples, and [`CaptureBuffer::on_hardware_error`] when it
/// clears an overrun flag. Only one context may feed a buffer at a time.
///
/// Implemented by:
/// - `ToneSource` (host, timer-paced sine generator)
pub trait SampleSource: Send {
    /// Begin delivering blocks into `feed`.
    fn start(&mut self, feed: Arc<CaptureBuffer>) -> Result<(), PipelineError>;

    /// Stop delivering blocks and release the feed.
    fn stop(&mut self) -> Result<(), PipelineError>;

    /// Short human-readable description used in logs.
    fn name(&self) -> &str;
}

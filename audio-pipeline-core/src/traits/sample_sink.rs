use std::sync::Arc;

use crate::models::error::PipelineError;
use crate::processing::playback_buffers::PlaybackBuffers;

/// Speaker-side peripheral feed.
///
/// Once started, the implementation calls
/// [`PlaybackBuffers::on_ready_for_more`] on every hardware "ready for
/// more" event with an output quantum to fill. The call never blocks and
/// always fills the whole quantum, with silence when nothing is queued.
pub trait SampleSink: Send {
    fn start(&mut self, feed: Arc<PlaybackBuffers>) -> Result<(), PipelineError>;

    fn stop(&mut self) -> Result<(), PipelineError>;

    fn name(&self) -> &str;
}

use chrono::NaiveDateTime;

use crate::models::error::PipelineError;
use crate::traits::file_service::FileService;

/// Strategy that proposes names for new recordings.
///
/// [`find_available_name`] calls `reset` once, then alternates
/// `candidate` and `on_collision` until a free name turns up.
pub trait FilenamePolicy: Send {
    fn reset(&mut self) {}

    fn candidate(&self) -> String;

    /// The last candidate already exists on the volume.
    fn on_collision(&mut self);
}

/// `rec_0000.wav`, `rec_0001.wav`, ...
///
/// The counter only advances on collision, so after a restart the first
/// save probes upward from zero past the files already on the volume.
#[derive(Debug, Clone, Default)]
pub struct SequentialNames {
    counter: u32,
}

impl SequentialNames {
    pub fn starting_at(counter: u32) -> Self {
        Self { counter }
    }
}

impl FilenamePolicy for SequentialNames {
    fn candidate(&self) -> String {
        format!("rec_{:04}.wav", self.counter)
    }

    fn on_collision(&mut self) {
        self.counter = self.counter.wrapping_add(1);
    }
}

/// `rec_YYYYMMDD_HHMMSS.wav`, with `_NN` appended on collision.
pub struct TimestampNames {
    clock: Box<dyn Fn() -> NaiveDateTime + Send>,
    stamp: NaiveDateTime,
    suffix: u32,
}

impl TimestampNames {
    /// Stamps from the local wall clock.
    pub fn new() -> Self {
        Self::with_clock(|| chrono::Local::now().naive_local())
    }

    pub fn with_clock(clock: impl Fn() -> NaiveDateTime + Send + 'static) -> Self {
        let stamp = clock();
        Self {
            clock: Box::new(clock),
            stamp,
            suffix: 0,
        }
    }
}

impl Default for TimestampNames {
    fn default() -> Self {
        Self::new()
    }
}

impl FilenamePolicy for TimestampNames {
    fn reset(&mut self) {
        self.stamp = (self.clock)();
        self.suffix = 0;
    }

    fn candidate(&self) -> String {
        let stamp = self.stamp.format("%Y%m%d_%H%M%S");
        match self.suffix {
            0 => format!("rec_{}.wav", stamp),
            n => format!("rec_{}_{:02}.wav", stamp, n),
        }
    }

    fn on_collision(&mut self) {
        self.suffix += 1;
    }
}

/// Probe `fs` for a name that does not exist yet, up to `retries` times.
pub fn find_available_name(
    policy: &mut dyn FilenamePolicy,
    fs: &dyn FileService,
    retries: u32,
) -> Result<String, PipelineError> {
    policy.reset();
    for _ in 0..retries {
        let name = policy.candidate();
        if !fs.exists(&name) {
            return Ok(name);
        }
        log::debug!("{} exists, trying next name", name);
        policy.on_collision();
    }
    Err(PipelineError::StorageOpenFailed(format!(
        "no free file name after {} attempts",
        retries
    )))
}

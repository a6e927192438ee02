//! Command-line arguments and logging setup for the recorder binary.

use std::path::PathBuf;

use clap::Parser;
use log::LevelFilter;

use crate::config_file::HostConfig;

/// Interactive record / store / playback console
#[derive(Parser, Debug)]
#[command(name = "audio-pipeline")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Increase logging verbosity
    /// -v = info, -vv = debug, -vvv = trace
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    pub quiet: bool,

    /// JSON config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory used as the storage volume
    #[arg(long)]
    pub dir: Option<PathBuf>,

    /// Volume name accepted as a "<volume>:" prefix on file names
    #[arg(long)]
    pub volume: Option<String>,

    /// Frequency of the test tone fed to the recorder
    #[arg(long)]
    pub tone_hz: Option<f64>,

    /// Name recordings rec_YYYYMMDD_HHMMSS.wav instead of rec_NNNN.wav
    #[arg(long)]
    pub timestamp_names: bool,
}

impl Args {
    /// Get the log level filter based on verbosity flags
    pub fn log_level(&self) -> LevelFilter {
        if self.quiet {
            LevelFilter::Error
        } else {
            match self.verbose {
                0 => LevelFilter::Warn,
                1 => LevelFilter::Info,
                2 => LevelFilter::Debug,
                _ => LevelFilter::Trace,
            }
        }
    }

    /// Overlay the flags that were given onto `config`.
    pub fn apply(&self, config: &mut HostConfig) {
        if let Some(dir) = &self.dir {
            config.storage_dir = dir.clone();
        }
        if let Some(volume) = &self.volume {
            config.volume = Some(volume.clone());
        }
        if let Some(hz) = self.tone_hz {
            config.tone_hz = hz;
        }
        if self.timestamp_names {
            config.timestamp_names = true;
        }
    }
}

/// Initialize the logging system based on CLI arguments
pub fn init_logging(args: &Args) {
    let mut builder = env_logger::Builder::new();

    // Dependencies stay at warn; only workspace crates follow -v/-q.
    builder.filter_level(LevelFilter::Warn);
    for module in ["audio_pipeline", "audio_pipeline_core", "audio_pipeline_host"] {
        builder.filter_module(module, args.log_level());
    }

    builder.format_timestamp_millis().init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_flags_map_to_levels() {
        let args = Args::parse_from(["audio-pipeline", "-vv"]);
        assert_eq!(args.log_level(), LevelFilter::Debug);
        let args = Args::parse_from(["audio-pipeline", "-q", "-vvv"]);
        assert_eq!(args.log_level(), LevelFilter::Error);
        let args = Args::parse_from(["audio-pipeline"]);
        assert_eq!(args.log_level(), LevelFilter::Warn);
    }

    #[test]
    fn flags_override_config_file() {
        let args = Args::parse_from([
            "audio-pipeline",
            "--dir",
            "/tmp/rec",
            "--volume",
            "sd",
            "--tone-hz",
            "1000",
        ]);
        let mut config = HostConfig {
            tone_amplitude: 0.25,
            ..Default::default()
        };
        args.apply(&mut config);

        assert_eq!(config.storage_dir, PathBuf::from("/tmp/rec"));
        assert_eq!(config.volume.as_deref(), Some("sd"));
        assert_eq!(config.tone_hz, 1000.0);
        assert_eq!(config.tone_amplitude, 0.25);
        assert!(!config.timestamp_names);
    }
}

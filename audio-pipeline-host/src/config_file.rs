use std::fs;
use std::path::{Path, PathBuf};

use audio_pipeline_core::PipelineConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Settings for the desktop recorder.
///
/// Loaded from JSON; every field is optional. Pipeline tuning lives under
/// the `pipeline` key with the same field names as [`PipelineConfig`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Directory standing in for the storage volume.
    pub storage_dir: PathBuf,

    /// Volume name accepted as a `"<volume>:"` file name prefix.
    pub volume: Option<String>,

    pub tone_hz: f64,
    pub tone_amplitude: f64,

    /// Timestamped file names instead of `rec_NNNN.wav`.
    pub timestamp_names: bool,

    pub pipeline: PipelineConfig,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from("recordings"),
            volume: None,
            tone_hz: 440.0,
            tone_amplitude: 0.5,
            timestamp_names: false,
            pipeline: PipelineConfig::default(),
        }
    }
}

impl HostConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("loaded config from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recorder.json");
        fs::write(
            &path,
            r#"{ "volume": "sd", "pipeline": { "sample_rate": 8000, "channels": 1 } }"#,
        )
        .unwrap();

        let config = HostConfig::load(&path).unwrap();
        assert_eq!(config.volume.as_deref(), Some("sd"));
        assert_eq!(config.storage_dir, PathBuf::from("recordings"));
        assert_eq!(config.pipeline.sample_rate, 8000);
        assert_eq!(config.pipeline.channels, 1);
        assert_eq!(config.pipeline.drain_poll_limit, PipelineConfig::default().drain_poll_limit);
    }

    #[test]
    fn reports_missing_and_malformed_files() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            HostConfig::load(&dir.path().join("absent.json")),
            Err(ConfigError::Read { .. })
        ));

        let path = dir.path().join("broken.json");
        fs::write(&path, "{ tone_hz: ").unwrap();
        assert!(matches!(HostConfig::load(&path), Err(ConfigError::Parse { .. })));
    }
}

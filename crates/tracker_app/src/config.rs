use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::LevelFilter;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracker_engine::{ClientSettings, PollSettings};
use tracker_logging::{parse_level, tracker_info};

pub const DEFAULT_CONFIG_FILENAME: &str = "stage-tracker.ron";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config {path:?}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("failed to serialize config: {0}")]
    Serialize(String),
    #[error("failed to write config {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// On-disk settings for the `stage-tracker` binary. Absent fields take the
/// library defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub base_url: String,
    pub poll_interval_ms: u64,
    pub timeout_secs: u64,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub full_fetch_limit: u32,
    pub log_file: Option<PathBuf>,
    pub log_level: String,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        let client = ClientSettings::default();
        let poll = PollSettings::default();
        Self {
            base_url: client.base_url,
            poll_interval_ms: duration_millis(poll.interval),
            timeout_secs: poll.timeout.as_secs(),
            connect_timeout_ms: duration_millis(client.connect_timeout),
            request_timeout_ms: duration_millis(client.request_timeout),
            full_fetch_limit: poll.full_fetch_limit,
            log_file: None,
            log_level: "info".to_string(),
        }
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl TrackerConfig {
    /// Reads `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        ron::from_str(&content).map_err(|err| ConfigError::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
    }

    /// Writes the config through a temp file in the target directory, then
    /// renames it over `path`.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let pretty = ron::ser::PrettyConfig::new();
        let content = ron::ser::to_string_pretty(self, pretty)
            .map_err(|err| ConfigError::Serialize(err.to_string()))?;

        let write_err = |source: io::Error| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        let dir = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir).map_err(write_err)?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
        tmp.write_all(content.as_bytes()).map_err(write_err)?;
        tmp.flush().map_err(write_err)?;
        tmp.as_file_mut().sync_all().map_err(write_err)?;

        tmp.persist(path).map_err(|err| write_err(err.error))?;
        tracker_info!("wrote config to {:?}", path);
        Ok(())
    }

    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            base_url: self.base_url.clone(),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
        }
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            interval: Duration::from_millis(self.poll_interval_ms),
            timeout: Duration::from_secs(self.timeout_secs),
            full_fetch_limit: self.full_fetch_limit,
        }
    }

    /// Configured log level, or `Info` when the name is not recognized.
    pub fn level_filter(&self) -> LevelFilter {
        parse_level(&self.log_level).unwrap_or(LevelFilter::Info)
    }
}

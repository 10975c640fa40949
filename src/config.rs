//! TOML configuration for the store, the loader and logging.
//!
//! ```toml
//! log_filter = "info"
//!
//! [store]
//! chunk_size = 25
//!
//! [loader]
//! max_batch = 10
//! wait_ms = 1
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::kv::DEFAULT_CHUNK_SIZE;
use crate::loader::{LoaderConfig, DEFAULT_MAX_BATCH};

/// Top-level configuration file.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// `tracing_subscriber` filter used when `RUST_LOG` is unset.
    pub log_filter: String,
    /// Backend settings.
    pub store: StoreSection,
    /// Node loader batching.
    pub loader: LoaderSection,
}

/// `[store]` table.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreSection {
    /// Largest write request sent to the backend in one call.
    pub chunk_size: usize,
}

/// `[loader]` table.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoaderSection {
    /// IDs that fire a batch immediately.
    pub max_batch: usize,
    /// Milliseconds a partial batch waits before firing.
    pub wait_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: "info".to_string(),
            store: StoreSection::default(),
            loader: LoaderSection::default(),
        }
    }
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl Default for LoaderSection {
    fn default() -> Self {
        Self {
            max_batch: DEFAULT_MAX_BATCH,
            wait_ms: 1,
        }
    }
}

impl Config {
    /// Reads and validates a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`Config::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) if path.exists() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    /// Rejects sizes of zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.chunk_size == 0 {
            return Err(ConfigError::Invalid("store.chunk_size must be at least 1"));
        }
        if self.loader.max_batch == 0 {
            return Err(ConfigError::Invalid("loader.max_batch must be at least 1"));
        }
        Ok(())
    }

    /// Batching policy for a [`crate::NodeLoader`].
    pub fn loader_config(&self) -> LoaderConfig {
        LoaderConfig::default()
            .max_batch(self.loader.max_batch)
            .wait(Duration::from_millis(self.loader.wait_ms))
    }

    /// Renders the configuration as a TOML document.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|source| ConfigError::Serialize { source })
    }
}

/// Failures loading a [`Config`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        /// File that was read.
        path: PathBuf,
        /// I/O failure.
        source: std::io::Error,
    },
    /// The file is not valid configuration.
    #[error("failed to parse config {path}: {source}")]
    Parse {
        /// File that was parsed.
        path: PathBuf,
        /// Parse failure.
        source: toml::de::Error,
    },
    /// The configuration could not be rendered.
    #[error("failed to serialize config: {source}")]
    Serialize {
        /// Serialization failure.
        source: toml::ser::Error,
    },
    /// A value is out of range.
    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(contents.as_bytes()).expect("write config");
        file
    }

    #[test]
    fn defaults_match_loader_defaults() {
        let config = Config::default();
        assert_eq!(config.loader_config(), LoaderConfig::default());
        assert_eq!(config.store.chunk_size, DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn partial_files_keep_remaining_defaults() {
        let file = write_config("[loader]\nmax_batch = 4\n");
        let config = Config::load(file.path()).expect("load");
        assert_eq!(config.loader.max_batch, 4);
        assert_eq!(config.loader.wait_ms, 1);
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn rejects_unknown_keys_and_zero_sizes() {
        let file = write_config("[loader]\nmax_bach = 4\n");
        assert!(matches!(Config::load(file.path()), Err(ConfigError::Parse { .. })));

        let file = write_config("[store]\nchunk_size = 0\n");
        assert!(matches!(Config::load(file.path()), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn missing_files() {
        let missing = Path::new("/definitely/not/here.toml");
        assert!(matches!(Config::load(missing), Err(ConfigError::Read { .. })));
        assert_eq!(
            Config::load_or_default(Some(missing)).expect("defaults"),
            Config::default()
        );
        assert_eq!(Config::load_or_default(None).expect("defaults"), Config::default());
    }

    #[test]
    fn serialized_config_round_trips() {
        let mut config = Config::default();
        config.loader.wait_ms = 5;
        let file = write_config(&config.to_toml().expect("serialize"));
        assert_eq!(Config::load(file.path()).expect("load"), config);
    }
}

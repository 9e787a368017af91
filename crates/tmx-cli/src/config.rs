//! CLI configuration file
//!
//! ```toml
//! store_root = "data/content"
//! records_path = "data/records.json"
//!
//! [engine]
//! backup_label = "before-apply-migration"
//!
//! [log]
//! filter = "tmx_core=debug,info"
//! json = false
//! ```

use serde::Deserialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tmx_core::EngineConfig;

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "tmx.toml";

/// Log output settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `TMX_LOG` is unset
    pub filter: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

/// Settings of the `tmx` binary
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Root directory of the content store
    pub store_root: PathBuf,
    /// JSON file holding migration records
    pub records_path: PathBuf,
    pub engine: EngineConfig,
    pub log: LogConfig,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            store_root: PathBuf::from("tmx-data/content"),
            records_path: PathBuf::from("tmx-data/records.json"),
            engine: EngineConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl CliConfig {
    /// Load from `path`. A missing file yields the defaults.
    ///
    /// # Errors
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::parse(&text).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Parse TOML text
    ///
    /// # Errors
    /// Returns error on invalid TOML or unknown values
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

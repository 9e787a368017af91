//! TMX CLI - command-line surface of the migration engine
//!
//! Drives [`tmx_core::MigrationEngine`] over a directory-backed content
//! store and a JSON record file.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod commands;
pub mod config;

pub use commands::App;
pub use config::{CliConfig, ConfigError, LogConfig, DEFAULT_CONFIG_FILE};

use tracing_subscriber::EnvFilter;

/// Environment variable overriding the configured log filter
pub const LOG_ENV: &str = "TMX_LOG";

/// Install the global subscriber. Logs go to stderr.
///
/// # Errors
/// Returns error if a subscriber is already installed
pub fn init_tracing(log: &LogConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(&log.filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let installed = if log.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow::anyhow!(e))
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Helpers shared across commands.

use std::path::{Path, PathBuf};

use terracontour::config::{config_directory, config_file_path, ConfigFile};
use terracontour::logging::{self, LoggingGuard};

use crate::error::CliError;

/// Logs to `~/.terracontour/logs` and stderr.
pub fn init_logging() -> Result<LoggingGuard, CliError> {
    let log_dir = config_directory().join("logs");
    logging::init_logging(&log_dir, logging::default_log_file())
        .map_err(|e| CliError::LoggingInit(e.to_string()))
}

/// Config path from `--config`, or the default location.
pub fn resolve_config_path(path: Option<PathBuf>) -> PathBuf {
    path.unwrap_or_else(config_file_path)
}

/// Loads the config file, falling back to defaults when it is missing.
pub fn load_config(path: &Path) -> Result<ConfigFile, CliError> {
    Ok(ConfigFile::load_from(path)?)
}

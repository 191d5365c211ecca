//! Init command - write the default config file.

use std::path::PathBuf;

use terracontour::config::ConfigFile;

use super::common::resolve_config_path;
use crate::error::CliError;

/// Run the init command.
pub fn run(path: Option<PathBuf>) -> Result<(), CliError> {
    let path = resolve_config_path(path);
    if ConfigFile::ensure_exists_at(&path)? {
        println!("Created {}", path.display());
    } else {
        println!("Config already exists at {}", path.display());
    }
    Ok(())
}

//! CLI error handling with user-friendly messages.

use std::fmt;
use std::path::PathBuf;
use std::process;

use terracontour::config::ConfigFileError;
use terracontour::{DecodeError, DemError};

/// CLI-specific errors.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(ConfigFileError),
    /// Failed to read an input file
    FileRead {
        path: PathBuf,
        error: std::io::Error,
    },
    /// Tile bytes could not be decoded
    Decode(DecodeError),
    /// Tile request failed
    Request(DemError),
    /// Output could not be serialized
    Output(String),
    /// A command-line value is out of range
    InvalidArgument { arg: &'static str, reason: String },
}

impl CliError {
    /// Exit the process with an error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Request(DemError::Fetch { .. }) => {
                eprintln!();
                eprintln!("Check the tile URL template and that the tile exists at this zoom.");
            }
            CliError::Request(DemError::Decode(_)) | CliError::Decode(_) => {
                eprintln!();
                eprintln!("Check that --encoding matches the tile source.");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::FileRead { path, error } => {
                write!(f, "Failed to read '{}': {}", path.display(), error)
            }
            CliError::Decode(e) => write!(f, "Failed to decode tile: {}", e),
            CliError::Request(e) => write!(f, "Tile request failed: {}", e),
            CliError::Output(msg) => write!(f, "Failed to write output: {}", msg),
            CliError::InvalidArgument { arg, reason } => {
                write!(f, "Invalid value for --{}: {}", arg, reason)
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) => Some(e),
            CliError::FileRead { error, .. } => Some(error),
            CliError::Decode(e) => Some(e),
            CliError::Request(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e)
    }
}

impl From<DemError> for CliError {
    fn from(e: DemError) -> Self {
        CliError::Request(e)
    }
}

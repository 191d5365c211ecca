//! Logging setup.
//!
//! Events go to a log file (truncated at startup) and to stderr, so stdout
//! stays free for command output. Filtering follows `RUST_LOG` and defaults
//! to `info`.

use std::fs;
use std::io;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Keeps the file writer alive; dropping it flushes the log.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

/// Installs the global subscriber.
///
/// Creates `log_dir` if needed and clears any previous `log_file` in it.
/// Fails if the directory or file cannot be written, or if a global
/// subscriber is already installed.
pub fn init_logging(log_dir: &Path, log_file: &str) -> Result<LoggingGuard, io::Error> {
    let (file_writer, guard) = prepare_log_file(log_dir, log_file)?;

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true);

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .compact();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::AlreadyExists, e.to_string()))?;

    Ok(LoggingGuard { _file_guard: guard })
}

fn prepare_log_file(
    log_dir: &Path,
    log_file: &str,
) -> Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard), io::Error> {
    fs::create_dir_all(log_dir)?;
    fs::write(log_dir.join(log_file), "")?;

    let appender = tracing_appender::rolling::never(log_dir, log_file);
    Ok(tracing_appender::non_blocking(appender))
}

/// Default log file name.
pub fn default_log_file() -> &'static str {
    "terracontour.log"
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // The global subscriber can only be installed once per process, so these
    // tests cover file preparation only.

    #[test]
    fn test_prepare_creates_nested_directory() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("deep").join("logs");
        let (_writer, _guard) = prepare_log_file(&dir, "test.log").unwrap();
        assert!(dir.join("test.log").exists());
    }

    #[test]
    fn test_prepare_clears_previous_log() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("test.log");
        fs::write(&path, "old session").unwrap();

        let (_writer, _guard) = prepare_log_file(temp.path(), "test.log").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_default_log_file() {
        assert_eq!(default_log_file(), "terracontour.log");
    }
}

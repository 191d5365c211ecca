//! Configuration file handling for ~/.terracontour/config.ini.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use super::{
    ContourOptions, SourceConfig, DEFAULT_CACHE_SIZE, DEFAULT_HTTP_TIMEOUT, DEFAULT_INTERVAL,
    DEFAULT_MAXZOOM, DEFAULT_SUBSAMPLE_BELOW, DEFAULT_TIMEOUT, DEFAULT_URL,
};
use crate::decode::Encoding;

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Failed to write config file
    #[error("Failed to write config file: {0}")]
    WriteError(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// Failed to create config directory
    #[error("Failed to create config directory: {0}")]
    DirectoryError(std::io::Error),
}

/// `[source]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSettings {
    pub url: String,
    pub encoding: Encoding,
    pub maxzoom: u8,
    pub timeout_ms: u64,
    pub http_timeout_secs: u64,
    pub worker: bool,
}

/// `[cache]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    /// Decoded tiles kept in memory.
    pub size: usize,
}

/// `[contour]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct ContourSettings {
    pub interval: f64,
    pub major_interval: Option<f64>,
    pub multiplier: f32,
    pub overzoom: u8,
    pub subsample_below: u32,
}

/// Everything stored in the config file.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    pub source: SourceSettings,
    pub cache: CacheSettings,
    pub contour: ContourSettings,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            source: SourceSettings {
                url: DEFAULT_URL.to_string(),
                encoding: Encoding::Terrarium,
                maxzoom: DEFAULT_MAXZOOM,
                timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
                http_timeout_secs: DEFAULT_HTTP_TIMEOUT.as_secs(),
                worker: true,
            },
            cache: CacheSettings {
                size: DEFAULT_CACHE_SIZE,
            },
            contour: ContourSettings {
                interval: DEFAULT_INTERVAL,
                major_interval: None,
                multiplier: 1.0,
                overzoom: 0,
                subsample_below: DEFAULT_SUBSAMPLE_BELOW,
            },
        }
    }
}

impl ConfigFile {
    /// Load configuration from the default path (~/.terracontour/config.ini).
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from a specific path.
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        super::parser::parse_ini(&ini)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigFileError::DirectoryError)?;
        }

        let content = super::writer::to_config_string(self);
        std::fs::write(path, content).map_err(|e| ConfigFileError::WriteError(e.to_string()))
    }

    /// Create the config file at `path` if it doesn't exist.
    ///
    /// Returns true if a new file was written.
    pub fn ensure_exists_at(path: &Path) -> Result<bool, ConfigFileError> {
        if path.exists() {
            return Ok(false);
        }
        Self::default().save_to(path)?;
        Ok(true)
    }

    /// Runtime source configuration.
    pub fn to_source_config(&self) -> SourceConfig {
        SourceConfig::new(self.source.url.clone())
            .with_encoding(self.source.encoding)
            .with_maxzoom(self.source.maxzoom)
            .with_timeout(Duration::from_millis(self.source.timeout_ms))
            .with_http_timeout(Duration::from_secs(self.source.http_timeout_secs))
            .with_worker(self.source.worker)
            .with_cache_size(self.cache.size)
    }

    /// Default contour options for requests.
    pub fn to_contour_options(&self) -> ContourOptions {
        let options = ContourOptions::new()
            .with_interval(self.contour.interval)
            .with_multiplier(self.contour.multiplier)
            .with_overzoom(self.contour.overzoom)
            .with_subsample_below(self.contour.subsample_below);
        match self.contour.major_interval {
            Some(major) => options.with_major_interval(major),
            None => options,
        }
    }
}

/// Get the path to the config directory (~/.terracontour).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".terracontour")
}

/// Get the path to the config file (~/.terracontour/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp = TempDir::new().unwrap();
        let config = ConfigFile::load_from(&temp.path().join("absent.ini")).unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_save_then_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.ini");

        let mut config = ConfigFile::default();
        config.source.url = "https://dem.example/{z}/{x}/{y}.webp".to_string();
        config.source.encoding = Encoding::Mapbox;
        config.source.worker = false;
        config.cache.size = 250;
        config.contour.interval = 20.0;
        config.contour.major_interval = Some(200.0);
        config.contour.multiplier = 3.28084;
        config.save_to(&path).unwrap();

        let loaded = ConfigFile::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_ensure_exists_at() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.ini");
        assert!(ConfigFile::ensure_exists_at(&path).unwrap());
        assert!(!ConfigFile::ensure_exists_at(&path).unwrap());
        assert_eq!(ConfigFile::load_from(&path).unwrap(), ConfigFile::default());
    }

    #[test]
    fn test_conversions() {
        let mut config = ConfigFile::default();
        config.source.timeout_ms = 2500;
        config.cache.size = 7;
        config.contour.interval = 25.0;

        let source = config.to_source_config();
        assert_eq!(source.timeout(), Duration::from_millis(2500));
        assert_eq!(source.cache_size(), 7);

        let options = config.to_contour_options();
        assert_eq!(options.interval(), 25.0);
        assert_eq!(options.major_interval(), 125.0);
    }

    #[test]
    fn test_config_path_layout() {
        let path = config_file_path();
        assert!(path.ends_with(".terracontour/config.ini"));
    }
}

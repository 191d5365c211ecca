//! Tile source configuration.

use std::time::Duration;

use super::{
    DEFAULT_CACHE_SIZE, DEFAULT_HTTP_TIMEOUT, DEFAULT_MAXZOOM, DEFAULT_TIMEOUT, DEFAULT_URL,
};
use crate::coord::TileUrlTemplate;
use crate::decode::Encoding;

/// Where DEM tiles come from and how they are fetched.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use terracontour::config::SourceConfig;
/// use terracontour::decode::Encoding;
///
/// let config = SourceConfig::new("https://tiles.example/{z}/{x}/{y}.png")
///     .with_encoding(Encoding::Mapbox)
///     .with_maxzoom(14)
///     .with_timeout(Duration::from_secs(5));
/// assert_eq!(config.maxzoom(), 14);
/// assert_eq!(config.cache_size(), 100);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SourceConfig {
    url: TileUrlTemplate,
    encoding: Encoding,
    maxzoom: u8,
    cache_size: usize,
    timeout: Duration,
    worker: bool,
    http_timeout: Duration,
}

impl SourceConfig {
    /// Creates a configuration for the given URL template with defaults.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: TileUrlTemplate::new(url),
            ..Self::default()
        }
    }

    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Highest zoom the source serves; finer tiles are cut from it.
    pub fn with_maxzoom(mut self, maxzoom: u8) -> Self {
        self.maxzoom = maxzoom;
        self
    }

    /// Number of decoded tiles kept in memory (minimum 1).
    pub fn with_cache_size(mut self, cache_size: usize) -> Self {
        self.cache_size = cache_size.max(1);
        self
    }

    /// Deadline for one tile request, including waiting on a shared load.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Decode on a background worker thread instead of the runtime's
    /// blocking pool.
    pub fn with_worker(mut self, worker: bool) -> Self {
        self.worker = worker;
        self
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    pub fn url(&self) -> &TileUrlTemplate {
        &self.url
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn maxzoom(&self) -> u8 {
        self.maxzoom
    }

    pub fn cache_size(&self) -> usize {
        self.cache_size
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn worker(&self) -> bool {
        self.worker
    }

    pub fn http_timeout(&self) -> Duration {
        self.http_timeout
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: TileUrlTemplate::new(DEFAULT_URL),
            encoding: Encoding::Terrarium,
            maxzoom: DEFAULT_MAXZOOM,
            cache_size: DEFAULT_CACHE_SIZE,
            timeout: DEFAULT_TIMEOUT,
            worker: true,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SourceConfig::default();
        assert_eq!(config.encoding(), Encoding::Terrarium);
        assert_eq!(config.maxzoom(), 12);
        assert_eq!(config.cache_size(), 100);
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert!(config.worker());
        assert_eq!(config.url().as_str(), DEFAULT_URL);
    }

    #[test]
    fn test_cache_size_has_floor() {
        assert_eq!(SourceConfig::default().with_cache_size(0).cache_size(), 1);
    }
}

//! Tile manager: fetch, decode and cache DEM tiles.
//!
//! [`DemManager`] answers "give me the decoded tile at `(z, x, y)`". Each
//! tile is fetched and decoded at most once while it stays in the cache,
//! however many callers ask for it concurrently.
//!
//! ```text
//! fetch_and_parse_tile ─► AsyncCache ─(miss)─► TileFetcher ─► DecodeStrategy
//!                             │                                    │
//!                             └──────────── Arc<DemTile> ◄─────────┘
//! ```
//!
//! Decoding runs either on the blocking pool of the current runtime
//! ([`DecodeStrategy::Local`]) or on a [`DecodeWorker`] thread reached
//! through message passing ([`DecodeStrategy::Remote`]). Both give the same
//! results; only scheduling differs.

mod timing;

pub use self::timing::{Timing, TimingCallback, TimingOutcome};

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::cache::{AsyncCache, CacheStats};
use crate::config::SourceConfig;
use crate::coord::{TileCoord, TileUrlTemplate};
use crate::decode::{self, DemTile, Encoding, ImageDecoder};
use crate::error::DemError;
use crate::fetch::TileFetcher;
use crate::worker::DecodeWorker;

/// Cache key: a tile coordinate qualified by its source and encoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TileKey {
    pub url: String,
    pub encoding: Encoding,
    pub coord: TileCoord,
}

/// Where tile bytes are decoded.
#[derive(Clone)]
pub enum DecodeStrategy {
    /// Decode on the blocking thread pool of the calling runtime.
    Local(Arc<dyn ImageDecoder>),
    /// Dispatch decoding to a background worker.
    Remote(Arc<DecodeWorker>),
}

impl DecodeStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            DecodeStrategy::Local(_) => "local",
            DecodeStrategy::Remote(_) => "remote",
        }
    }

    async fn decode(
        &self,
        bytes: Bytes,
        encoding: Encoding,
        cancel: &CancellationToken,
    ) -> Result<DemTile, DemError> {
        match self {
            DecodeStrategy::Local(images) => {
                let images = Arc::clone(images);
                let task = tokio::task::spawn_blocking(move || {
                    decode::decode(&bytes, encoding, images.as_ref())
                });
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(DemError::Cancelled),
                    joined = task => joined
                        .map_err(|e| DemError::Worker(format!("decode task failed: {}", e)))?
                        .map_err(DemError::from),
                }
            }
            DecodeStrategy::Remote(worker) => worker.decode(bytes, encoding, cancel).await,
        }
    }
}

impl fmt::Debug for DecodeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Durations measured by the caller that drove a load.
#[derive(Debug, Default, Clone, Copy)]
struct Phases {
    fetch: Option<Duration>,
    decode: Option<Duration>,
}

/// Fetches, decodes and caches DEM tiles for one source.
pub struct DemManager {
    url: TileUrlTemplate,
    encoding: Encoding,
    timeout: Duration,
    cache: AsyncCache<TileKey, Arc<DemTile>>,
    fetcher: Arc<dyn TileFetcher>,
    strategy: DecodeStrategy,
    timing_callbacks: Mutex<Vec<TimingCallback>>,
}

impl DemManager {
    pub fn new(
        config: &SourceConfig,
        fetcher: Arc<dyn TileFetcher>,
        strategy: DecodeStrategy,
    ) -> Self {
        debug!(
            url = %config.url(),
            encoding = %config.encoding(),
            cache_size = config.cache_size(),
            strategy = strategy.name(),
            "Creating tile manager"
        );
        Self {
            url: config.url().clone(),
            encoding: config.encoding(),
            timeout: config.timeout(),
            cache: AsyncCache::new(config.cache_size()),
            fetcher,
            strategy,
            timing_callbacks: Mutex::new(Vec::new()),
        }
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn strategy(&self) -> &DecodeStrategy {
        &self.strategy
    }

    /// URL of the tile at `coord`.
    pub fn tile_url(&self, coord: TileCoord) -> String {
        self.url.resolve(coord)
    }

    /// Registers a callback that receives one [`Timing`] per request.
    pub fn on_timing<F>(&self, callback: F)
    where
        F: Fn(&Timing) + Send + Sync + 'static,
    {
        self.timing_callbacks.lock().push(Arc::new(callback));
    }

    /// Resolves once the decode context is ready to take work.
    pub async fn loaded(&self) -> Result<(), DemError> {
        match &self.strategy {
            DecodeStrategy::Local(_) => Ok(()),
            DecodeStrategy::Remote(worker) => worker.loaded().await,
        }
    }

    /// Returns the decoded tile at `coord`.
    ///
    /// Concurrent requests for the same tile share one fetch and decode.
    /// Cancelling `cancel` detaches this caller only; the shared load is
    /// aborted once no caller waits for it. Failures are not cached.
    pub async fn fetch_and_parse_tile(
        &self,
        coord: TileCoord,
        cancel: &CancellationToken,
    ) -> Result<Arc<DemTile>, DemError> {
        let url = self.tile_url(coord);
        let started = Instant::now();
        let phases = Arc::new(Mutex::new(None::<Phases>));

        let result = if coord.is_valid() {
            let key = TileKey {
                url: self.url.as_str().to_string(),
                encoding: self.encoding,
                coord,
            };
            let fetcher = Arc::clone(&self.fetcher);
            let strategy = self.strategy.clone();
            let encoding = self.encoding;
            let load_url = url.clone();
            let load_phases = Arc::clone(&phases);

            self.cache
                .get_or_load(key, cancel, self.timeout, move |token| async move {
                    load_tile(fetcher, strategy, load_url, encoding, token, load_phases).await
                })
                .await
        } else {
            Err(DemError::fetch(&url, format!("tile {} is out of range", coord)))
        };

        let phases = *phases.lock();
        self.emit_timing(Timing {
            coord,
            url,
            fetch: phases.and_then(|p| p.fetch),
            decode: phases.and_then(|p| p.decode),
            total: started.elapsed(),
            shared: phases.is_none(),
            outcome: TimingOutcome::from_result(&result),
        });
        result
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Drops every cached and pending tile.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    fn emit_timing(&self, timing: Timing) {
        let callbacks = self.timing_callbacks.lock().clone();
        for callback in callbacks {
            callback(&timing);
        }
    }
}

async fn load_tile(
    fetcher: Arc<dyn TileFetcher>,
    strategy: DecodeStrategy,
    url: String,
    encoding: Encoding,
    cancel: CancellationToken,
    phases: Arc<Mutex<Option<Phases>>>,
) -> Result<Arc<DemTile>, DemError> {
    let mut measured = Phases::default();

    let fetch_start = Instant::now();
    let fetched = fetcher.fetch(&url, cancel.clone()).await;
    measured.fetch = Some(fetch_start.elapsed());
    *phases.lock() = Some(measured);

    let bytes = fetched.map_err(|e| {
        if !e.is_cancelled() {
            warn!(url = %url, error = %e, "Tile fetch failed");
        }
        e
    })?;
    trace!(url = %url, bytes = bytes.len(), "Tile fetched");

    let decode_start = Instant::now();
    let decoded = strategy.decode(bytes, encoding, &cancel).await;
    measured.decode = Some(decode_start.elapsed());
    *phases.lock() = Some(measured);

    let tile = decoded.map_err(|e| {
        if !e.is_cancelled() {
            warn!(url = %url, error = %e, "Tile decode failed");
        }
        e
    })?;
    debug!(
        url = %url,
        width = tile.width,
        height = tile.height,
        fetch_ms = measured.fetch.map(|d| d.as_millis() as u64),
        decode_ms = measured.decode.map(|d| d.as_millis() as u64),
        "Tile loaded"
    );
    Ok(Arc::new(tile))
}

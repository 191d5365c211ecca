//! Virtual-tile orchestration.
//!
//! [`DemTileSource`] is the entry point renderers use. It turns a requested
//! tile coordinate into:
//!
//! - the raw decoded tile ([`DemTileSource::get_dem_tile`]),
//! - an elevation grid for that tile, cut from a coarser source tile when
//!   overzooming ([`DemTileSource::get_height_tile`]),
//! - a seam-free composite of the tile and its eight neighbours, resampled
//!   to a working resolution ([`DemTileSource::get_height_tile_with_neighbors`]),
//! - the contour lines of that composite ([`DemTileSource::contour_tile`]).

use std::sync::Arc;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cache::CacheStats;
use crate::config::{ContourOptions, HeightTileOptions, SourceConfig, MAX_SUBSAMPLE_BELOW};
use crate::contour::{generate_isolines, ContourSet};
use crate::coord::TileCoord;
use crate::decode::{DemTile, ImageCrateDecoder, ImageDecoder};
use crate::error::DemError;
use crate::fetch::{ReqwestFetcher, TileFetcher};
use crate::grid::ElevationGrid;
use crate::manager::{DecodeStrategy, DemManager, Timing};
use crate::worker::DecodeWorker;

/// Elevation tiles and contours for one DEM source.
pub struct DemTileSource {
    config: SourceConfig,
    manager: DemManager,
}

impl DemTileSource {
    /// Creates a source that fetches over HTTP and decodes with the `image` crate.
    ///
    /// With `config.worker()` set, decoding runs on a background thread,
    /// which requires a tokio runtime.
    pub fn new(config: SourceConfig) -> Result<Self, DemError> {
        let fetcher = Arc::new(ReqwestFetcher::with_timeout(config.http_timeout())?);
        Self::with_fetcher(config, fetcher)
    }

    /// Creates a source with a custom transport.
    pub fn with_fetcher(
        config: SourceConfig,
        fetcher: Arc<dyn TileFetcher>,
    ) -> Result<Self, DemError> {
        Self::with_parts(config, fetcher, Arc::new(ImageCrateDecoder))
    }

    /// Creates a source with a custom transport and image decoder.
    pub fn with_parts(
        config: SourceConfig,
        fetcher: Arc<dyn TileFetcher>,
        images: Arc<dyn ImageDecoder>,
    ) -> Result<Self, DemError> {
        let strategy = if config.worker() {
            let worker = DecodeWorker::spawn(Some(Arc::clone(&images)), images)?;
            DecodeStrategy::Remote(Arc::new(worker))
        } else {
            DecodeStrategy::Local(images)
        };
        info!(
            url = %config.url(),
            encoding = %config.encoding(),
            maxzoom = config.maxzoom(),
            strategy = strategy.name(),
            "DEM source ready"
        );
        let manager = DemManager::new(&config, fetcher, strategy);
        Ok(Self { config, manager })
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    pub fn manager(&self) -> &DemManager {
        &self.manager
    }

    /// Resolves once the decode context answers.
    pub async fn loaded(&self) -> Result<(), DemError> {
        self.manager.loaded().await
    }

    /// Registers a callback for per-tile timing records.
    pub fn on_timing<F>(&self, callback: F)
    where
        F: Fn(&Timing) + Send + Sync + 'static,
    {
        self.manager.on_timing(callback);
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.manager.cache_stats()
    }

    /// Raw decoded tile at `coord`.
    pub async fn get_dem_tile(
        &self,
        coord: TileCoord,
        cancel: &CancellationToken,
    ) -> Result<Arc<DemTile>, DemError> {
        self.manager.fetch_and_parse_tile(coord, cancel).await
    }

    /// Elevation grid for `coord`.
    ///
    /// Beyond `maxzoom`, or when `options.overzoom` asks for it, the grid is
    /// the matching quadrant of a coarser tile.
    pub async fn get_height_tile(
        &self,
        coord: TileCoord,
        options: &HeightTileOptions,
        cancel: &CancellationToken,
    ) -> Result<ElevationGrid, DemError> {
        if !coord.is_valid() {
            return Err(DemError::fetch(
                self.manager.tile_url(coord),
                format!("tile {} is out of range", coord),
            ));
        }
        let split = coord.overzoom_split(self.config.maxzoom(), options.overzoom);
        let tile = self.manager.fetch_and_parse_tile(split.source, cancel).await?;
        Ok(ElevationGrid::from_raw(&tile).split(split.depth, split.sub_x, split.sub_y))
    }

    /// Composite grid of `coord` and its neighbours, ready for contouring.
    ///
    /// `x` wraps around the antimeridian; rows beyond the poles are left out.
    /// A neighbour that fails to load is treated as absent and filled from
    /// the edge of the centre tile. Returns `Ok(None)` when `coord` is out of
    /// range. Errors loading the centre tile are returned.
    pub async fn get_height_tile_with_neighbors(
        &self,
        coord: TileCoord,
        options: &HeightTileOptions,
        cancel: &CancellationToken,
    ) -> Result<Option<ElevationGrid>, DemError> {
        if !coord.is_valid() {
            return Ok(None);
        }

        let requests = coord.neighbors().map(move |neighbor| async move {
            match neighbor {
                Some(c) => Some(self.get_height_tile(c, options, cancel).await),
                None => None,
            }
        });
        let results = join_all(requests).await;

        let mut tiles: [Option<ElevationGrid>; 9] = Default::default();
        for (i, (slot, result)) in tiles.iter_mut().zip(results).enumerate() {
            match result {
                None => {}
                Some(Ok(grid)) => *slot = Some(grid),
                Some(Err(e)) if i == 4 => return Err(e),
                Some(Err(e)) => {
                    if !e.is_cancelled() {
                        debug!(tile = %coord, neighbor = i, error = %e, "Neighbour unavailable");
                    }
                }
            }
        }

        let Some(combined) = ElevationGrid::combine_neighbors(tiles) else {
            return Ok(None);
        };

        let options = *options;
        let grid = tokio::task::spawn_blocking(move || compose(combined, &options))
            .await
            .map_err(|e| DemError::Worker(format!("grid composition failed: {}", e)))?;
        Ok(Some(grid))
    }

    /// Contour lines of the composite grid at `coord`.
    ///
    /// Coordinates are in grid-pixel space of the composite, with the tile
    /// spanning `[0, width - 1]`. Returns `Ok(None)` when `coord` is out of range.
    pub async fn contour_tile(
        &self,
        coord: TileCoord,
        options: &ContourOptions,
        cancel: &CancellationToken,
    ) -> Result<Option<ContourSet>, DemError> {
        let Some(grid) = self
            .get_height_tile_with_neighbors(coord, options.height(), cancel)
            .await?
        else {
            return Ok(None);
        };

        let interval = options.interval();
        let buffer = options.buffer();
        let contours = tokio::task::spawn_blocking(move || {
            let extent = grid.width() as i32 - 1;
            generate_isolines(interval, &grid, extent, buffer)
        })
        .await
        .map_err(|e| DemError::Worker(format!("contour extraction failed: {}", e)))?;

        debug!(
            tile = %coord,
            levels = contours.len(),
            lines = contours.line_count(),
            "Contours generated"
        );
        Ok(Some(contours))
    }
}

/// Brings a combined grid to working resolution.
///
/// Grids narrower than `subsample_below` are doubled until they reach it.
/// Pixel centres are then averaged onto a vertex grid, scaled and
/// evaluated.
fn compose(combined: ElevationGrid, options: &HeightTileOptions) -> ElevationGrid {
    let target = options.subsample_below.min(MAX_SUBSAMPLE_BELOW);
    let mut grid = combined;
    if grid.width() >= target {
        grid = grid.materialize(2);
    } else {
        while grid.width() < target {
            grid = grid.subsample_pixel_centers(2).materialize(2);
        }
    }
    grid.average_pixel_centers_to_grid(1)
        .scale_elevation(options.multiplier)
        .materialize(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_keeps_fine_grids() {
        let grid = ElevationGrid::from_samples(4, 4, vec![7.0; 16]);
        let options = HeightTileOptions::new().with_subsample_below(4);
        let out = compose(grid, &options);
        assert_eq!((out.width(), out.height()), (5, 5));
        assert!(out.is_materialized());
        assert_eq!(out.get(0, 0), 7.0);
        assert_eq!(out.get(4, 4), 7.0);
    }

    #[test]
    fn test_compose_subsamples_coarse_grids() {
        let grid = ElevationGrid::from_samples(4, 4, vec![3.0; 16]);
        let options = HeightTileOptions::new()
            .with_subsample_below(10)
            .with_multiplier(2.0);
        let out = compose(grid, &options);
        // 4 -> 8 -> 16, then one extra vertex column.
        assert_eq!(out.width(), 17);
        assert_eq!(out.get(8, 8), 6.0);
    }

    #[test]
    fn test_compose_with_non_finite_multiplier_stays_finite() {
        let grid = ElevationGrid::from_samples(2, 2, vec![5.0; 4]);
        let options = HeightTileOptions::new()
            .with_subsample_below(2)
            .with_multiplier(f32::NAN);
        let out = compose(grid, &options);
        assert_eq!(out.get(1, 1), 0.0);
    }
}

//! terracontour - elevation grids and contour lines from tiled DEM rasters
//!
//! The library turns `(z, x, y)` tile requests into decoded elevation
//! samples, seam-free composite grids and marching-squares contour lines.
//!
//! # Pipeline
//!
//! ```text
//! DemTileSource ─► DemManager ─► AsyncCache ─► TileFetcher (HTTP)
//!       │                                  └─► DecodeStrategy (inline or worker thread)
//!       ├─► ElevationGrid (split / combine / resample / scale / materialize)
//!       └─► generate_isolines ─► ContourSet
//! ```
//!
//! # Example
//!
//! ```no_run
//! use terracontour::config::{ContourOptions, SourceConfig, DEFAULT_URL};
//! use terracontour::{CancellationToken, DemTileSource, TileCoord};
//!
//! # async fn run() -> Result<(), terracontour::DemError> {
//! let source = DemTileSource::new(SourceConfig::new(DEFAULT_URL))?;
//! let options = ContourOptions::new().with_interval(50.0);
//! let cancel = CancellationToken::new();
//!
//! if let Some(contours) = source
//!     .contour_tile(TileCoord::new(10, 163, 395), &options, &cancel)
//!     .await?
//! {
//!     for (level, lines) in contours.iter() {
//!         println!("{} m: {} lines", level, lines.len());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod actor;
pub mod cache;
pub mod config;
pub mod contour;
pub mod coord;
pub mod decode;
pub mod error;
pub mod fetch;
pub mod grid;
pub mod logging;
pub mod manager;
pub mod source;
pub mod worker;

use std::future::Future;
use std::pin::Pin;

pub use contour::{generate_isolines, ContourSet};
pub use coord::{TileCoord, TileUrlTemplate};
pub use decode::{DemTile, Encoding};
pub use error::{DecodeError, DemError};
pub use grid::ElevationGrid;
pub use source::DemTileSource;
pub use tokio_util::sync::CancellationToken;

/// Boxed future used at object-safe async seams.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

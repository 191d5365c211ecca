//! Configuration for tile sources and contour generation.
//!
//! Runtime values are plain builder structs ([`SourceConfig`],
//! [`ContourOptions`], [`HeightTileOptions`]). [`ConfigFile`] persists them
//! as INI at `~/.terracontour/config.ini`.

mod file;
mod options;
mod parser;
mod source;
mod writer;

pub use self::file::{config_directory, config_file_path, ConfigFile, ConfigFileError};
pub use self::file::{CacheSettings, ContourSettings, SourceSettings};
pub use self::options::{ContourOptions, HeightTileOptions};
pub use self::source::SourceConfig;

use std::time::Duration;

/// Public terrarium tiles on AWS open data.
pub const DEFAULT_URL: &str = "https://s3.amazonaws.com/elevation-tiles-prod/terrarium/{z}/{x}/{y}.png";

/// Highest zoom the default source serves.
pub const DEFAULT_MAXZOOM: u8 = 12;

/// Decoded tiles kept in memory.
pub const DEFAULT_CACHE_SIZE: usize = 100;

/// Per-request deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// HTTP client timeout, independent of the per-request deadline.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Contour interval in elevation units.
pub const DEFAULT_INTERVAL: f64 = 10.0;

/// Major lines fall on every `DEFAULT_MAJOR_FACTOR`th contour.
pub const DEFAULT_MAJOR_FACTOR: f64 = 5.0;

/// Composite grids narrower than this are upsampled first.
pub const DEFAULT_SUBSAMPLE_BELOW: u32 = 100;

/// Widest grid composition will upsample toward.
pub const MAX_SUBSAMPLE_BELOW: u32 = 4096;

/// Cells scanned beyond each tile edge when extracting contours.
pub const DEFAULT_CONTOUR_BUFFER: i32 = 1;

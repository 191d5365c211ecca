//! Lazily-evaluated elevation grids.
//!
//! An [`ElevationGrid`] is a cheap-to-clone handle to a chain of transforms
//! over decoded samples. Each transform (crop, neighbour composite,
//! resampling, averaging, scaling) is a node that samples its parent on
//! demand; nothing is computed until [`ElevationGrid::get`] is called or the
//! chain is collapsed with [`ElevationGrid::materialize`].
//!
//! Every grid accepts any `i32` coordinate. Leaves clamp to the nearest
//! sample they own, so reads just outside the logical extent behave like
//! edge extension.

mod node;

use std::fmt;
use std::sync::Arc;

use rayon::prelude::*;

use self::node::Node;
use crate::decode::DemTile;

/// Buffers with at least this many samples are materialized row-parallel.
const PARALLEL_THRESHOLD: usize = 64 * 64;

/// Elevation samples with a logical `width × height` extent.
#[derive(Clone)]
pub struct ElevationGrid {
    width: u32,
    height: u32,
    node: Arc<Node>,
}

impl ElevationGrid {
    fn with_node(width: u32, height: u32, node: Node) -> Self {
        Self {
            width,
            height,
            node: Arc::new(node),
        }
    }

    /// Wraps the samples of a decoded tile 1:1.
    ///
    /// Non-finite samples are replaced with `0.0`.
    pub fn from_raw(tile: &DemTile) -> Self {
        Self::from_samples(tile.width, tile.height, tile.data.clone())
    }

    /// Builds a grid from row-major samples.
    ///
    /// Short input is padded with `0.0`, long input truncated.
    pub fn from_samples(width: u32, height: u32, mut data: Vec<f32>) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        data.resize(width as usize * height as usize, 0.0);
        for v in data.iter_mut() {
            if !v.is_finite() {
                *v = 0.0;
            }
        }
        Self::with_node(
            width,
            height,
            Node::Dense {
                data,
                stride: width as usize,
                border: 0,
            },
        )
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns the elevation at `(x, y)`.
    #[inline]
    pub fn get(&self, x: i32, y: i32) -> f32 {
        self.node
            .sample(self.width as i32, self.height as i32, x, y)
    }

    /// Name of the outermost transform, for logging.
    pub fn kind(&self) -> &'static str {
        self.node.kind()
    }

    /// Returns true if reads come straight from an owned buffer.
    pub fn is_materialized(&self) -> bool {
        matches!(*self.node, Node::Dense { .. })
    }

    /// Returns quadrant `(sub_x, sub_y)` after halving the grid `depth` times.
    ///
    /// `depth == 0` returns the grid itself.
    pub fn split(&self, depth: u8, sub_x: u32, sub_y: u32) -> ElevationGrid {
        if depth == 0 {
            return self.clone();
        }
        let by = 1u32.checked_shl(depth as u32).unwrap_or(u32::MAX);
        let width = (self.width / by).max(1);
        let height = (self.height / by).max(1);
        Self::with_node(
            width,
            height,
            Node::Crop {
                parent: self.clone(),
                dx: offset(sub_x, width),
                dy: offset(sub_y, height),
            },
        )
    }

    /// Lays a 3×3 neighbourhood (row-major, centre at index 4) edge to edge.
    ///
    /// The result keeps the centre's size and reads `[-w, 2w) × [-h, 2h)`
    /// from the matching neighbour. Returns `None` without a centre.
    pub fn combine_neighbors(tiles: [Option<ElevationGrid>; 9]) -> Option<ElevationGrid> {
        let center = tiles[4].clone()?;
        Some(Self::with_node(
            center.width,
            center.height,
            Node::Combine {
                center,
                tiles: Box::new(tiles),
            },
        ))
    }

    /// Bilinearly resamples at `factor` samples per source pixel.
    pub fn subsample_pixel_centers(&self, factor: u32) -> ElevationGrid {
        if factor <= 1 {
            return self.clone();
        }
        Self::with_node(
            self.width.saturating_mul(factor),
            self.height.saturating_mul(factor),
            Node::Subsample {
                parent: self.clone(),
                factor,
            },
        )
    }

    /// Converts pixel centres into a `(w+1) × (h+1)` vertex grid.
    ///
    /// Each vertex is the mean of the `2r × 2r` pixels around it.
    pub fn average_pixel_centers_to_grid(&self, radius: u32) -> ElevationGrid {
        Self::with_node(
            self.width + 1,
            self.height + 1,
            Node::Average {
                parent: self.clone(),
                radius: radius.min(i32::MAX as u32) as i32,
            },
        )
    }

    /// Multiplies every sample by `multiplier`.
    pub fn scale_elevation(&self, multiplier: f32) -> ElevationGrid {
        if multiplier == 1.0 {
            return self.clone();
        }
        Self::with_node(
            self.width,
            self.height,
            Node::Scale {
                parent: self.clone(),
                multiplier,
            },
        )
    }

    /// Evaluates the chain into an owned buffer covering `[-buffer, w + buffer)`.
    ///
    /// Reads inside that range return exactly what the chain returned;
    /// reads beyond it clamp to the buffer's edge.
    pub fn materialize(&self, buffer: u32) -> ElevationGrid {
        let b = buffer as i32;
        let stride = self.width as usize + 2 * buffer as usize;
        let rows = self.height as usize + 2 * buffer as usize;
        let mut data = vec![0.0f32; stride * rows];

        let fill_row = |(row, out): (usize, &mut [f32])| {
            let y = row as i32 - b;
            for (col, v) in out.iter_mut().enumerate() {
                *v = self.get(col as i32 - b, y);
            }
        };
        if data.len() >= PARALLEL_THRESHOLD {
            data.par_chunks_mut(stride).enumerate().for_each(fill_row);
        } else {
            data.chunks_mut(stride).enumerate().for_each(fill_row);
        }

        Self::with_node(
            self.width,
            self.height,
            Node::Dense {
                data,
                stride,
                border: b,
            },
        )
    }

    /// Minimum and maximum over the logical extent.
    pub fn min_max(&self) -> (f32, f32) {
        let mut lo = f32::INFINITY;
        let mut hi = f32::NEG_INFINITY;
        for y in 0..self.height as i32 {
            for x in 0..self.width as i32 {
                let v = self.get(x, y);
                lo = lo.min(v);
                hi = hi.max(v);
            }
        }
        (lo, hi)
    }
}

/// Quadrant index times quadrant size, saturated into `i32`.
fn offset(index: u32, size: u32) -> i32 {
    index.saturating_mul(size).min(i32::MAX as u32) as i32
}

impl fmt::Debug for ElevationGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElevationGrid")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("kind", &self.kind())
            .finish()
    }
}

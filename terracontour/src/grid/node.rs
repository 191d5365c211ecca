//! Transform nodes behind an [`ElevationGrid`].
//!
//! Each node samples its inputs on demand. Only `Dense` owns memory; every
//! other node describes how to derive a sample from one or more parents.

use super::ElevationGrid;

pub(super) enum Node {
    /// Owned samples covering `[-border, width + border)` on each axis.
    Dense {
        data: Vec<f32>,
        stride: usize,
        border: i32,
    },
    /// Window into the parent starting at `(dx, dy)`.
    Crop {
        parent: ElevationGrid,
        dx: i32,
        dy: i32,
    },
    /// Bilinear resampling at `factor` times the parent's density.
    Subsample { parent: ElevationGrid, factor: u32 },
    /// Pixel centres averaged onto the grid vertices between them.
    Average { parent: ElevationGrid, radius: i32 },
    /// Constant multiplier on every sample.
    Scale {
        parent: ElevationGrid,
        multiplier: f32,
    },
    /// A centre tile with its 3×3 neighbourhood laid edge to edge.
    Combine {
        center: ElevationGrid,
        tiles: Box<[Option<ElevationGrid>; 9]>,
    },
}

impl Node {
    pub(super) fn kind(&self) -> &'static str {
        match self {
            Node::Dense { .. } => "dense",
            Node::Crop { .. } => "crop",
            Node::Subsample { .. } => "subsample",
            Node::Average { .. } => "average",
            Node::Scale { .. } => "scale",
            Node::Combine { .. } => "combine",
        }
    }

    pub(super) fn sample(&self, width: i32, height: i32, x: i32, y: i32) -> f32 {
        match self {
            Node::Dense {
                data,
                stride,
                border,
            } => {
                let cx = x.clamp(-border, width + border - 1) + border;
                let cy = y.clamp(-border, height + border - 1) + border;
                data[cy as usize * stride + cx as usize]
            }
            Node::Crop { parent, dx, dy } => {
                parent.get(x.saturating_add(*dx), y.saturating_add(*dy))
            }
            Node::Subsample { parent, factor } => {
                let by = *factor as f64;
                let fx = (x as f64 + 0.5) / by - 0.5;
                let fy = (y as f64 + 0.5) / by - 0.5;
                let ox = fx.floor();
                let oy = fy.floor();
                let (tx, ty) = ((fx - ox) as f32, (fy - oy) as f32);
                let (ox, oy) = (ox as i32, oy as i32);

                let a = parent.get(ox, oy);
                let (nx, ny) = (ox.saturating_add(1), oy.saturating_add(1));
                let b = parent.get(nx, oy);
                let c = parent.get(ox, ny);
                let d = parent.get(nx, ny);
                let top = lerp(a, b, tx);
                let bottom = lerp(c, d, tx);
                lerp(top, bottom, ty)
            }
            Node::Average { parent, radius } => {
                let mut sum = 0.0f64;
                let mut count = 0u32;
                for ny in y.saturating_sub(*radius)..y.saturating_add(*radius) {
                    for nx in x.saturating_sub(*radius)..x.saturating_add(*radius) {
                        sum += parent.get(nx, ny) as f64;
                        count += 1;
                    }
                }
                if count == 0 {
                    parent.get(x, y)
                } else {
                    (sum / count as f64) as f32
                }
            }
            Node::Scale { parent, multiplier } => finite(parent.get(x, y) * multiplier),
            Node::Combine { center, tiles } => sample_combined(center, tiles, x, y),
        }
    }
}

/// Maps NaN to zero and infinities to the nearest finite value.
#[inline]
fn finite(v: f32) -> f32 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(f32::MIN, f32::MAX)
    }
}

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Splits a composite coordinate into a tile index (0..3) and a local coordinate.
#[inline]
fn split_axis(v: i32, size: i32) -> (usize, i32) {
    let v = v.clamp(-size, 2 * size - 1);
    if v < 0 {
        (0, v + size)
    } else if v < size {
        (1, v)
    } else {
        (2, v - size)
    }
}

/// Local coordinate of the edge facing the centre for a neighbour slot.
#[inline]
fn inner_edge(slot: usize, size: i32) -> i32 {
    if slot == 0 {
        0
    } else {
        size - 1
    }
}

fn sample_combined(
    center: &ElevationGrid,
    tiles: &[Option<ElevationGrid>; 9],
    x: i32,
    y: i32,
) -> f32 {
    let (w, h) = (center.width() as i32, center.height() as i32);
    let (tx, lx) = split_axis(x, w);
    let (ty, ly) = split_axis(y, h);
    if let Some(tile) = &tiles[ty * 3 + tx] {
        return tile.get(lx, ly);
    }

    // Missing neighbour: pull the row toward the centre, clamping onto the
    // nearest edge of the tile that takes its place.
    let (ty, ly) = if ty == 1 { (1, ly) } else { (1, inner_edge(ty, h)) };
    if let Some(tile) = &tiles[ty * 3 + tx] {
        return tile.get(lx, ly);
    }
    let lx = if tx == 1 { lx } else { inner_edge(tx, w) };
    center.get(lx, ly)
}

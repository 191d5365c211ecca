//! Marching-squares isoline extraction.
//!
//! [`generate_isolines`] walks the unit cells of an [`ElevationGrid`] and
//! emits, for every multiple of the contour interval, the polylines where
//! the surface crosses that elevation. Output coordinates are in grid-pixel
//! space; scaling them to a canvas is left to the caller.
//!
//! Corners are numbered clockwise from the top left, and a cell's case index
//! has one bit per corner that lies at or above the level:
//!
//! ```text
//!   tl (8) ---- tr (4)
//!     |           |
//!   bl (1) ---- br (2)
//! ```

mod fragment;

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use self::fragment::{EdgeKey, Stitcher};
use crate::grid::ElevationGrid;

/// A crossing on one of the four cell edges, in half-cell units.
type EdgePoint = [i32; 2];

const LEFT: EdgePoint = [0, 1];
const RIGHT: EdgePoint = [2, 1];
const TOP: EdgePoint = [1, 0];
const BOTTOM: EdgePoint = [1, 2];

/// Segments per case, oriented so that the above side is consistent.
const CASES: [&[[EdgePoint; 2]]; 16] = [
    &[],
    &[[BOTTOM, LEFT]],
    &[[RIGHT, BOTTOM]],
    &[[RIGHT, LEFT]],
    &[[TOP, RIGHT]],
    &[[BOTTOM, LEFT], [TOP, RIGHT]],
    &[[TOP, BOTTOM]],
    &[[TOP, LEFT]],
    &[[LEFT, TOP]],
    &[[BOTTOM, TOP]],
    &[[LEFT, TOP], [RIGHT, BOTTOM]],
    &[[RIGHT, TOP]],
    &[[LEFT, RIGHT]],
    &[[BOTTOM, RIGHT]],
    &[[LEFT, BOTTOM]],
    &[],
];

/// Saddle cases when the cell centre is at or above the level.
const SADDLE_5: &[[EdgePoint; 2]] = &[[TOP, LEFT], [BOTTOM, RIGHT]];
const SADDLE_10: &[[EdgePoint; 2]] = &[[RIGHT, TOP], [LEFT, BOTTOM]];

/// Polylines keyed by contour level.
///
/// Levels are stored as their index `k`, so the elevation of a level is
/// `k * interval` and keys never suffer from float comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContourSet {
    interval: f64,
    lines: BTreeMap<i64, Vec<Vec<f64>>>,
}

impl ContourSet {
    /// Creates an empty set.
    pub fn new(interval: f64) -> Self {
        Self {
            interval,
            lines: BTreeMap::new(),
        }
    }

    pub fn interval(&self) -> f64 {
        self.interval
    }

    /// Elevations that have at least one polyline, ascending.
    pub fn levels(&self) -> impl Iterator<Item = f64> + '_ {
        self.lines.keys().map(|&k| k as f64 * self.interval)
    }

    /// `(elevation, polylines)` pairs, ascending by elevation.
    pub fn iter(&self) -> impl Iterator<Item = (f64, &[Vec<f64>])> + '_ {
        self.lines
            .iter()
            .map(|(&k, lines)| (k as f64 * self.interval, lines.as_slice()))
    }

    /// Polylines at `level`, each a flat `[x0, y0, x1, y1, ...]` vector.
    pub fn get(&self, level: f64) -> Option<&[Vec<f64>]> {
        let k = self.level_index(level)?;
        self.lines.get(&k).map(Vec::as_slice)
    }

    /// Number of levels with polylines.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total number of polylines across all levels.
    pub fn line_count(&self) -> usize {
        self.lines.values().map(Vec::len).sum()
    }

    /// Returns true if `level` is a multiple of `major_interval`.
    pub fn is_major(level: f64, major_interval: f64) -> bool {
        if !(major_interval > 0.0) || !level.is_finite() {
            return false;
        }
        let r = level / major_interval;
        (r - r.round()).abs() < 1e-9
    }

    /// Splits into `(major, minor)` sets.
    pub fn split_major(&self, major_interval: f64) -> (ContourSet, ContourSet) {
        let mut major = ContourSet::new(self.interval);
        let mut minor = ContourSet::new(self.interval);
        for (&k, lines) in &self.lines {
            let target = if Self::is_major(k as f64 * self.interval, major_interval) {
                &mut major
            } else {
                &mut minor
            };
            target.lines.insert(k, lines.clone());
        }
        (major, minor)
    }

    fn level_index(&self, level: f64) -> Option<i64> {
        if !(self.interval > 0.0) {
            return None;
        }
        let r = level / self.interval;
        let k = r.round();
        ((r - k).abs() < 1e-9).then_some(k as i64)
    }
}

/// Extracts isolines at every multiple of `interval`.
///
/// Cells whose top-left corner lies in `[-buffer, extent + buffer)` on both
/// axes are scanned in row-major order. Candidate levels lie strictly
/// between the minimum and maximum of the scanned samples; a corner equal
/// to the level counts as above it. A non-positive or non-finite interval
/// yields an empty set.
pub fn generate_isolines(
    interval: f64,
    grid: &ElevationGrid,
    extent: i32,
    buffer: i32,
) -> ContourSet {
    let mut set = ContourSet::new(interval);
    if !(interval > 0.0) || !interval.is_finite() {
        return set;
    }

    let lo = -buffer;
    let hi = extent + buffer;
    if hi <= lo {
        return set;
    }

    let mut region_min = f64::INFINITY;
    let mut region_max = f64::NEG_INFINITY;
    for y in lo..=hi {
        for x in lo..=hi {
            let v = grid.get(x, y) as f64;
            region_min = region_min.min(v);
            region_max = region_max.max(v);
        }
    }
    let k_min = (region_min / interval).floor() as i64 + 1;
    let k_max = (region_max / interval).ceil() as i64 - 1;
    if k_max < k_min {
        return set;
    }

    let mut stitchers: HashMap<i64, Stitcher> = HashMap::new();
    for cy in lo..hi {
        for cx in lo..hi {
            let c = Corners {
                tl: grid.get(cx, cy) as f64,
                tr: grid.get(cx + 1, cy) as f64,
                br: grid.get(cx + 1, cy + 1) as f64,
                bl: grid.get(cx, cy + 1) as f64,
            };
            let min = c.tl.min(c.tr).min(c.br).min(c.bl);
            let max = c.tl.max(c.tr).max(c.br).max(c.bl);
            let first = ((min / interval).ceil() as i64).max(k_min);
            let last = ((max / interval).floor() as i64).min(k_max);

            for k in first..=last {
                let level = k as f64 * interval;
                let index = (usize::from(c.tl >= level) << 3)
                    | (usize::from(c.tr >= level) << 2)
                    | (usize::from(c.br >= level) << 1)
                    | usize::from(c.bl >= level);

                let segments = match index {
                    0 | 15 => continue,
                    5 if c.average() >= level => SADDLE_5,
                    10 if c.average() >= level => SADDLE_10,
                    _ => CASES[index],
                };

                let stitcher = stitchers.entry(k).or_default();
                for [from, to] in segments {
                    stitcher.add_segment(
                        crossing(cx, cy, *from, &c, level),
                        crossing(cx, cy, *to, &c, level),
                    );
                }
            }
        }
    }

    for (k, stitcher) in stitchers {
        let lines = stitcher.finish();
        if !lines.is_empty() {
            set.lines.insert(k, lines);
        }
    }
    set
}

struct Corners {
    tl: f64,
    tr: f64,
    br: f64,
    bl: f64,
}

impl Corners {
    fn average(&self) -> f64 {
        (self.tl + self.tr + self.br + self.bl) / 4.0
    }
}

/// Interpolated crossing on one edge of cell `(cx, cy)`.
fn crossing(cx: i32, cy: i32, edge: EdgePoint, c: &Corners, level: f64) -> (EdgeKey, [f64; 2]) {
    let x = cx as f64;
    let y = cy as f64;
    let point = match edge {
        LEFT => [x, y + ratio(level, c.tl, c.bl)],
        RIGHT => [x + 1.0, y + ratio(level, c.tr, c.br)],
        TOP => [x + ratio(level, c.tl, c.tr), y],
        _ => [x + ratio(level, c.bl, c.br), y + 1.0],
    };
    ((2 * cx + edge[0], 2 * cy + edge[1]), point)
}

#[inline]
fn ratio(level: f64, v0: f64, v1: f64) -> f64 {
    if v1 == v0 {
        0.5
    } else {
        (level - v0) / (v1 - v0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(width: u32, height: u32, f: impl Fn(u32, u32) -> f32) -> ElevationGrid {
        let mut data = Vec::new();
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        ElevationGrid::from_samples(width, height, data)
    }

    fn points(line: &[f64]) -> Vec<[f64; 2]> {
        line.chunks_exact(2).map(|p| [p[0], p[1]]).collect()
    }

    #[test]
    fn test_flat_grid_has_no_contours() {
        let g = grid(8, 8, |_, _| 120.0);
        assert!(generate_isolines(10.0, &g, 7, 1).is_empty());
    }

    #[test]
    fn test_non_positive_interval_is_empty() {
        let g = grid(4, 4, |x, _| x as f32 * 100.0);
        assert!(generate_isolines(0.0, &g, 3, 1).is_empty());
        assert!(generate_isolines(-5.0, &g, 3, 1).is_empty());
        assert!(generate_isolines(f64::NAN, &g, 3, 1).is_empty());
    }

    #[test]
    fn test_step_edge_produces_one_vertical_line() {
        let g = grid(4, 4, |x, _| if x < 2 { 0.0 } else { 20.0 });
        let set = generate_isolines(10.0, &g, 3, 0);
        assert_eq!(set.levels().collect::<Vec<_>>(), vec![10.0]);

        let lines = set.get(10.0).unwrap();
        assert_eq!(lines.len(), 1);
        let pts = points(&lines[0]);
        assert_eq!(pts.len(), 4);
        for p in &pts {
            assert!((p[0] - 1.5).abs() < 1e-9, "{:?}", p);
        }
        let ys: Vec<f64> = pts.iter().map(|p| p[1]).collect();
        assert!(ys == vec![0.0, 1.0, 2.0, 3.0] || ys == vec![3.0, 2.0, 1.0, 0.0]);
    }

    #[test]
    fn test_peak_produces_closed_ring() {
        let g = grid(5, 5, |x, y| if x == 2 && y == 2 { 100.0 } else { 0.0 });
        let set = generate_isolines(50.0, &g, 4, 0);
        let lines = set.get(50.0).unwrap();
        assert_eq!(lines.len(), 1);
        let ring = points(&lines[0]);
        assert_eq!(ring.len(), 5);
        assert_eq!(ring.first(), ring.last());
        for p in &ring {
            let d = (p[0] - 2.0).abs() + (p[1] - 2.0).abs();
            assert!((d - 0.5).abs() < 1e-9, "{:?}", p);
        }
    }

    #[test]
    fn test_multiple_levels() {
        let g = grid(6, 2, |x, _| x as f32 * 10.0);
        let set = generate_isolines(10.0, &g, 5, 0);
        // 0 and 50 are the extremes of the scanned region
        let levels: Vec<f64> = set.levels().collect();
        assert_eq!(levels, vec![10.0, 20.0, 30.0, 40.0]);
    }

    #[test]
    fn test_level_equal_to_sample_counts_as_above() {
        let g = grid(3, 2, |x, _| x as f32 * 10.0);
        let set = generate_isolines(10.0, &g, 2, 0);
        let lines = set.get(10.0).unwrap();
        // only the left cell crosses; the line runs through the middle corners
        assert_eq!(lines.len(), 1);
        for p in points(&lines[0]) {
            assert_eq!(p[0], 1.0);
        }
    }

    #[test]
    fn test_saddle_resolution_uses_center_average() {
        // tl and br high, tr and bl low
        let high = grid(2, 2, |x, y| if x == y { 100.0 } else { 0.0 });
        let set = generate_isolines(40.0, &high, 1, 0);
        // average 50 >= 40: high corners connect through the centre,
        // so the two segments cut off the low corners
        let lines = set.get(40.0).unwrap();
        assert_eq!(lines.len(), 2);
        for line in lines {
            let pts = points(line);
            let touches_tr = pts.iter().any(|p| p[0] == 1.0) && pts.iter().any(|p| p[1] == 0.0);
            let touches_bl = pts.iter().any(|p| p[0] == 0.0) && pts.iter().any(|p| p[1] == 1.0);
            assert!(touches_tr ^ touches_bl);
        }

        let set = generate_isolines(60.0, &high, 1, 0);
        // average 50 < 60: high corners are isolated
        for line in set.get(60.0).unwrap() {
            let pts = points(line);
            let touches_tl = pts.iter().any(|p| p[0] == 0.0) && pts.iter().any(|p| p[1] == 0.0);
            let touches_br = pts.iter().any(|p| p[0] == 1.0) && pts.iter().any(|p| p[1] == 1.0);
            assert!(touches_tl ^ touches_br);
        }
    }

    #[test]
    fn test_buffer_extends_scan_region() {
        let g = grid(4, 4, |x, _| x as f32 * 10.0);
        let narrow = generate_isolines(10.0, &g, 1, 0);
        let wide = generate_isolines(10.0, &g, 1, 1);
        assert!(wide.line_count() >= narrow.line_count());
        assert!(wide.len() > narrow.len());
    }

    #[test]
    fn test_output_is_deterministic() {
        let g = grid(16, 16, |x, y| ((x * 7 + y * 13) % 23) as f32 * 5.0);
        let a = generate_isolines(10.0, &g, 15, 1);
        let b = generate_isolines(10.0, &g, 15, 1);
        assert_eq!(a, b);
    }

    #[test]
    fn test_split_major() {
        let g = grid(8, 2, |x, _| x as f32 * 10.0);
        let set = generate_isolines(10.0, &g, 7, 0);
        let (major, minor) = set.split_major(50.0);
        assert_eq!(major.levels().collect::<Vec<_>>(), vec![50.0]);
        assert_eq!(minor.len() + major.len(), set.len());
        assert!(ContourSet::is_major(-100.0, 50.0));
        assert!(!ContourSet::is_major(20.0, 50.0));
        assert!(!ContourSet::is_major(20.0, 0.0));
    }

    #[test]
    fn test_get_rejects_off_interval_level() {
        let g = grid(4, 2, |x, _| x as f32 * 10.0);
        let set = generate_isolines(10.0, &g, 3, 0);
        assert!(set.get(10.0).is_some());
        assert!(set.get(15.0).is_none());
    }
}

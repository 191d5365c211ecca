//! Tile pyramid addressing.
//!
//! Tiles are addressed `(z, x, y)` in the XYZ/slippy-map convention:
//! - `x` is the column, `0..2^z`, and wraps east-west
//! - `y` is the row, `0..2^z`, and does not wrap (the poles are edges)

use std::fmt;

/// Deepest zoom whose rows and columns fit in `u32`.
pub const MAX_ZOOM: u8 = 32;

/// XYZ tile coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoord {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

/// How a tile at a finer zoom is carved out of a coarser source tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverzoomSplit {
    /// The coarser tile to fetch.
    pub source: TileCoord,
    /// Number of halvings between the source and the requested tile.
    pub depth: u8,
    /// Column of the requested quadrant within the source, in quadrant units.
    pub sub_x: u32,
    /// Row of the requested quadrant within the source, in quadrant units.
    pub sub_y: u32,
}

impl TileCoord {
    /// Creates a tile coordinate.
    pub fn new(z: u8, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

    /// Number of tiles along one axis at zoom `z`, saturating at [`MAX_ZOOM`].
    #[inline]
    pub fn tiles_at_zoom(z: u8) -> u64 {
        1u64 << z.min(MAX_ZOOM)
    }

    /// Returns true if the zoom is supported and `x` and `y` lie inside the
    /// pyramid at that zoom.
    pub fn is_valid(&self) -> bool {
        let n = Self::tiles_at_zoom(self.z);
        self.z <= MAX_ZOOM && (self.x as u64) < n && (self.y as u64) < n
    }

    /// Returns the tile offset by `(dx, dy)`.
    ///
    /// `x` wraps modulo `2^z`; a row outside `[0, 2^z)` yields `None`.
    pub fn offset(&self, dx: i64, dy: i64) -> Option<TileCoord> {
        let n = Self::tiles_at_zoom(self.z) as i64;
        let y = self.y as i64 + dy;
        if y < 0 || y >= n {
            return None;
        }
        let x = (self.x as i64 + dx).rem_euclid(n);
        Some(TileCoord::new(self.z, x as u32, y as u32))
    }

    /// Returns the 3×3 neighbourhood in row-major order, centre at index 4.
    pub fn neighbors(&self) -> [Option<TileCoord>; 9] {
        let mut out = [None; 9];
        for (i, slot) in out.iter_mut().enumerate() {
            let dx = (i % 3) as i64 - 1;
            let dy = (i / 3) as i64 - 1;
            *slot = self.offset(dx, dy);
        }
        out
    }

    /// Resolves the source tile for this coordinate when overzooming.
    ///
    /// The source zoom is `min(z - overzoom, maxzoom)`; when that equals `z`
    /// the split depth is zero and the source is the tile itself.
    pub fn overzoom_split(&self, maxzoom: u8, overzoom: u8) -> OverzoomSplit {
        let zoom = self.z.saturating_sub(overzoom).min(maxzoom);
        let depth = self.z - zoom;
        // past 32 halvings every u32 column falls into source column 0
        let div = 1u64 << depth.min(MAX_ZOOM);
        let (x, y) = (self.x as u64, self.y as u64);
        OverzoomSplit {
            source: TileCoord::new(zoom, (x / div) as u32, (y / div) as u32),
            depth,
            sub_x: (x % div) as u32,
            sub_y: (y % div) as u32,
        }
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// URL template with `{z}`, `{x}` and `{y}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TileUrlTemplate(String);

impl TileUrlTemplate {
    /// Creates a template from a pattern string.
    pub fn new(pattern: impl Into<String>) -> Self {
        Self(pattern.into())
    }

    /// Returns the raw pattern.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Substitutes the tile coordinate into the pattern.
    pub fn resolve(&self, coord: TileCoord) -> String {
        self.0
            .replace("{z}", &coord.z.to_string())
            .replace("{x}", &coord.x.to_string())
            .replace("{y}", &coord.y.to_string())
    }
}

impl fmt::Display for TileUrlTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neighbors_wrap_x_at_west_edge() {
        let n = TileCoord::new(2, 0, 1).neighbors();
        assert_eq!(n[4], Some(TileCoord::new(2, 0, 1)));
        assert_eq!(n[3], Some(TileCoord::new(2, 3, 1)));
        assert_eq!(n[5], Some(TileCoord::new(2, 1, 1)));
    }

    #[test]
    fn test_neighbors_wrap_x_at_east_edge() {
        let n = TileCoord::new(2, 3, 1).neighbors();
        assert_eq!(n[5], Some(TileCoord::new(2, 0, 1)));
        assert_eq!(n[3], Some(TileCoord::new(2, 2, 1)));
    }

    #[test]
    fn test_neighbors_do_not_wrap_y() {
        let top = TileCoord::new(2, 1, 0).neighbors();
        assert!(top[0..3].iter().all(Option::is_none));
        assert!(top[3..9].iter().all(Option::is_some));

        let bottom = TileCoord::new(2, 1, 3).neighbors();
        assert!(bottom[6..9].iter().all(Option::is_none));
        assert!(bottom[0..6].iter().all(Option::is_some));
    }

    #[test]
    fn test_zoom_zero_wraps_onto_itself() {
        let n = TileCoord::new(0, 0, 0).neighbors();
        assert_eq!(n[3], Some(TileCoord::new(0, 0, 0)));
        assert_eq!(n[5], Some(TileCoord::new(0, 0, 0)));
        assert_eq!(n[1], None);
        assert_eq!(n[7], None);
    }

    #[test]
    fn test_overzoom_split() {
        let split = TileCoord::new(14, 8195, 5462).overzoom_split(12, 1);
        assert_eq!(split.source, TileCoord::new(12, 2048, 1365));
        assert_eq!(split.depth, 2);
        assert_eq!((split.sub_x, split.sub_y), (3, 2));
    }

    #[test]
    fn test_overzoom_split_identity() {
        let tile = TileCoord::new(10, 5, 7);
        let split = tile.overzoom_split(12, 0);
        assert_eq!(split.source, tile);
        assert_eq!(split.depth, 0);
        assert_eq!((split.sub_x, split.sub_y), (0, 0));
    }

    #[test]
    fn test_url_template() {
        let template = TileUrlTemplate::new("https://tiles.example/{z}/{x}/{y}.png");
        assert_eq!(
            template.resolve(TileCoord::new(3, 4, 5)),
            "https://tiles.example/3/4/5.png"
        );
    }

    #[test]
    fn test_is_valid() {
        assert!(TileCoord::new(1, 1, 1).is_valid());
        assert!(!TileCoord::new(1, 2, 0).is_valid());
    }

    #[test]
    fn test_deep_zoom_is_invalid_not_a_panic() {
        assert!(TileCoord::new(MAX_ZOOM, u32::MAX, u32::MAX).is_valid());
        assert!(!TileCoord::new(MAX_ZOOM + 1, 0, 0).is_valid());
        assert!(!TileCoord::new(64, 0, 0).is_valid());
        assert!(!TileCoord::new(u8::MAX, 0, 0).is_valid());
        assert_eq!(TileCoord::tiles_at_zoom(u8::MAX), 1u64 << 32);
    }

    #[test]
    fn test_offset_at_deep_zoom() {
        let n = TileCoord::new(u8::MAX, u32::MAX, 5).neighbors();
        assert_eq!(n[5], Some(TileCoord::new(u8::MAX, 0, 5)));
        let edge = TileCoord::new(MAX_ZOOM, 0, u32::MAX).neighbors();
        assert!(edge[6..9].iter().all(Option::is_none));
    }

    #[test]
    fn test_overzoom_split_deeper_than_u32() {
        let split = TileCoord::new(40, 7, 9).overzoom_split(0, 0);
        assert_eq!(split.source, TileCoord::new(0, 0, 0));
        assert_eq!(split.depth, 40);
        assert_eq!((split.sub_x, split.sub_y), (7, 9));

        let split = TileCoord::new(MAX_ZOOM, u32::MAX, 1).overzoom_split(1, 0);
        assert_eq!(split.source, TileCoord::new(1, 1, 0));
        assert_eq!(split.depth, 31);
        assert_eq!(split.sub_x, u32::MAX >> 1);
    }
}

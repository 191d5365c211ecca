//! Per-request options for height and contour tiles.

use super::{
    DEFAULT_CONTOUR_BUFFER, DEFAULT_INTERVAL, DEFAULT_MAJOR_FACTOR, DEFAULT_SUBSAMPLE_BELOW,
    MAX_SUBSAMPLE_BELOW,
};

/// How a composite height tile is built.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeightTileOptions {
    /// Zoom levels to borrow from a coarser tile.
    pub overzoom: u8,
    /// Multiplier applied to every elevation (e.g. metres to feet).
    pub multiplier: f32,
    /// Grids narrower than this are upsampled before averaging, up to
    /// [`MAX_SUBSAMPLE_BELOW`].
    pub subsample_below: u32,
}

impl Default for HeightTileOptions {
    fn default() -> Self {
        Self {
            overzoom: 0,
            multiplier: 1.0,
            subsample_below: DEFAULT_SUBSAMPLE_BELOW,
        }
    }
}

impl HeightTileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_overzoom(mut self, overzoom: u8) -> Self {
        self.overzoom = overzoom;
        self
    }

    pub fn with_multiplier(mut self, multiplier: f32) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn with_subsample_below(mut self, subsample_below: u32) -> Self {
        self.subsample_below = subsample_below.min(MAX_SUBSAMPLE_BELOW);
        self
    }
}

/// Contour interval settings plus the height tile they are drawn from.
///
/// The major interval defaults to five times the interval until set
/// explicitly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContourOptions {
    interval: f64,
    major_interval: Option<f64>,
    buffer: i32,
    height: HeightTileOptions,
}

impl Default for ContourOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            major_interval: None,
            buffer: DEFAULT_CONTOUR_BUFFER,
            height: HeightTileOptions::default(),
        }
    }
}

impl ContourOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_interval(mut self, interval: f64) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_major_interval(mut self, major_interval: f64) -> Self {
        self.major_interval = Some(major_interval);
        self
    }

    /// Cells scanned beyond each tile edge.
    pub fn with_buffer(mut self, buffer: i32) -> Self {
        self.buffer = buffer.max(0);
        self
    }

    pub fn with_height(mut self, height: HeightTileOptions) -> Self {
        self.height = height;
        self
    }

    pub fn with_overzoom(mut self, overzoom: u8) -> Self {
        self.height.overzoom = overzoom;
        self
    }

    pub fn with_multiplier(mut self, multiplier: f32) -> Self {
        self.height.multiplier = multiplier;
        self
    }

    pub fn with_subsample_below(mut self, subsample_below: u32) -> Self {
        self.height = self.height.with_subsample_below(subsample_below);
        self
    }

    pub fn interval(&self) -> f64 {
        self.interval
    }

    pub fn major_interval(&self) -> f64 {
        self.major_interval
            .unwrap_or(self.interval * DEFAULT_MAJOR_FACTOR)
    }

    pub fn buffer(&self) -> i32 {
        self.buffer
    }

    pub fn height(&self) -> &HeightTileOptions {
        &self.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_major_interval_follows_interval() {
        let options = ContourOptions::new().with_interval(20.0);
        assert_eq!(options.major_interval(), 100.0);

        let options = options.with_major_interval(250.0).with_interval(50.0);
        assert_eq!(options.major_interval(), 250.0);
    }

    #[test]
    fn test_defaults() {
        let options = ContourOptions::default();
        assert_eq!(options.interval(), 10.0);
        assert_eq!(options.major_interval(), 50.0);
        assert_eq!(options.buffer(), 1);
        assert_eq!(options.height().overzoom, 0);
        assert_eq!(options.height().multiplier, 1.0);
        assert_eq!(options.height().subsample_below, 100);
    }

    #[test]
    fn test_subsample_below_is_capped() {
        let options = HeightTileOptions::new().with_subsample_below(u32::MAX);
        assert_eq!(options.subsample_below, MAX_SUBSAMPLE_BELOW);
        let options = ContourOptions::new().with_subsample_below(1 << 20);
        assert_eq!(options.height().subsample_below, MAX_SUBSAMPLE_BELOW);
    }

    #[test]
    fn test_height_setters_pass_through() {
        let options = ContourOptions::new()
            .with_overzoom(2)
            .with_multiplier(3.28084)
            .with_subsample_below(256);
        assert_eq!(
            *options.height(),
            HeightTileOptions::new()
                .with_overzoom(2)
                .with_multiplier(3.28084)
                .with_subsample_below(256)
        );
    }
}

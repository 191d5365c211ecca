//! Raw tile bytes → elevation samples.
//!
//! Four encodings are supported, all bit-exact:
//!
//! | Encoding    | Input                | Elevation                                   |
//! |-------------|----------------------|---------------------------------------------|
//! | `terrarium` | RGB image            | `R*256 + G + B/256 - 32768`                 |
//! | `mapbox`    | RGB image            | `-10000 + (R*65536 + G*256 + B) * 0.1`      |
//! | `raw16`     | header + `i16` LE    | sample value                                |
//! | `raw32`     | header + `f32` LE    | sample value                                |
//!
//! Image payloads are turned into RGBA pixels through an [`ImageDecoder`];
//! which facility does that is a platform concern; only the per-pixel mapping
//! is part of this module's contract.
//!
//! # Example
//!
//! ```
//! use terracontour::decode::{decode, Encoding, ImageCrateDecoder};
//!
//! // 1×2 raw16 tile: header (width=1, height=2) then two samples.
//! let bytes = [1, 0, 2, 0, 0x10, 0x00, 0xF6, 0xFF];
//! let tile = decode(&bytes, Encoding::Raw16, &ImageCrateDecoder).unwrap();
//! assert_eq!(tile.data, vec![16.0, -10.0]);
//! ```

mod pixels;
mod raw;

pub use self::pixels::{ImageCrateDecoder, ImageDecoder, RgbaPixels};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

/// Binary encoding of a DEM tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// Mapzen/AWS terrarium RGB encoding.
    #[default]
    Terrarium,
    /// Mapbox terrain-RGB encoding.
    Mapbox,
    /// Raw little-endian signed 16-bit samples with a size header.
    Raw16,
    /// Raw little-endian 32-bit float samples with a size header.
    Raw32,
}

impl Encoding {
    /// Returns the canonical lowercase tag.
    pub fn as_str(self) -> &'static str {
        match self {
            Encoding::Terrarium => "terrarium",
            Encoding::Mapbox => "mapbox",
            Encoding::Raw16 => "raw16",
            Encoding::Raw32 => "raw32",
        }
    }

    /// Returns true if the payload is an image rather than a raw buffer.
    pub fn is_image(self) -> bool {
        matches!(self, Encoding::Terrarium | Encoding::Mapbox)
    }

    /// Maps one RGB pixel to an elevation for the image encodings.
    ///
    /// Raw encodings have no pixel mapping and return `None`.
    #[inline]
    pub fn pixel_to_elevation(self, r: u8, g: u8, b: u8) -> Option<f32> {
        let (r, g, b) = (r as f64, g as f64, b as f64);
        match self {
            Encoding::Terrarium => Some((r * 256.0 + g + b / 256.0 - 32768.0) as f32),
            Encoding::Mapbox => Some((-10000.0 + (r * 65536.0 + g * 256.0 + b) * 0.1) as f32),
            Encoding::Raw16 | Encoding::Raw32 => None,
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Encoding {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "terrarium" => Ok(Encoding::Terrarium),
            "mapbox" => Ok(Encoding::Mapbox),
            "raw16" => Ok(Encoding::Raw16),
            "raw32" => Ok(Encoding::Raw32),
            other => Err(DecodeError::UnsupportedEncoding(other.to_string())),
        }
    }
}

/// A decoded elevation tile.
///
/// `data` holds `width * height` samples in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct DemTile {
    pub width: u32,
    pub height: u32,
    pub data: Vec<f32>,
}

impl DemTile {
    /// Creates a tile, checking that the sample count matches the dimensions.
    pub fn new(width: u32, height: u32, data: Vec<f32>) -> Result<Self, DecodeError> {
        if width == 0 || height == 0 {
            return Err(DecodeError::InvalidDimensions { width, height });
        }
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(DecodeError::LengthMismatch {
                width,
                height,
                expected: expected * 4,
                actual: data.len() * 4,
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Returns the sample at `(x, y)`, or `None` outside the tile.
    pub fn sample(&self, x: u32, y: u32) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// Returns the minimum and maximum finite sample.
    pub fn elevation_range(&self) -> Option<(f32, f32)> {
        self.data
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

/// Decodes tile bytes with the given encoding.
///
/// Image encodings are handed to `images` to obtain RGBA pixels first.
pub fn decode(
    bytes: &[u8],
    encoding: Encoding,
    images: &dyn ImageDecoder,
) -> Result<DemTile, DecodeError> {
    match encoding {
        Encoding::Raw16 => raw::decode_raw16(bytes),
        Encoding::Raw32 => raw::decode_raw32(bytes),
        Encoding::Terrarium | Encoding::Mapbox => {
            let pixels = images.decode_rgba(bytes)?;
            decode_parsed_image(pixels.width, pixels.height, encoding, &pixels.data)
        }
    }
}

/// Applies the per-pixel mapping of an image encoding to RGBA8 pixels.
///
/// The alpha channel is ignored.
pub fn decode_parsed_image(
    width: u32,
    height: u32,
    encoding: Encoding,
    rgba: &[u8],
) -> Result<DemTile, DecodeError> {
    if !encoding.is_image() {
        return Err(DecodeError::UnsupportedEncoding(format!(
            "{} is not an image encoding",
            encoding
        )));
    }
    let expected = width as usize * height as usize * 4;
    if rgba.len() != expected {
        return Err(DecodeError::LengthMismatch {
            width,
            height,
            expected,
            actual: rgba.len(),
        });
    }

    let data = rgba
        .chunks_exact(4)
        .filter_map(|px| encoding.pixel_to_elevation(px[0], px[1], px[2]))
        .collect();
    DemTile::new(width, height, data)
}

/// Encodes an elevation as a terrarium RGB triple.
///
/// Elevations are quantized to 1/256 m and clamped to the representable
/// range `[-32768, 32767.996]`.
pub fn encode_terrarium(elevation: f64) -> [u8; 3] {
    let v = (elevation + 32768.0).clamp(0.0, 65535.0 + 255.0 / 256.0);
    let whole = v.floor();
    let frac = ((v - whole) * 256.0).floor().min(255.0);
    let whole = whole as u32;
    [(whole >> 8) as u8, (whole & 0xFF) as u8, frac as u8]
}

/// Encodes an elevation as a Mapbox terrain-RGB triple.
pub fn encode_mapbox(elevation: f64) -> [u8; 3] {
    let v = ((elevation + 10000.0) * 10.0)
        .round()
        .clamp(0.0, 16_777_215.0) as u32;
    [(v >> 16) as u8, ((v >> 8) & 0xFF) as u8, (v & 0xFF) as u8]
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Image decoder that hands back a fixed pixel buffer.
    struct FixedPixels(RgbaPixels);

    impl ImageDecoder for FixedPixels {
        fn decode_rgba(&self, _bytes: &[u8]) -> Result<RgbaPixels, DecodeError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_encoding_from_str() {
        assert_eq!("terrarium".parse::<Encoding>().unwrap(), Encoding::Terrarium);
        assert_eq!("Mapbox".parse::<Encoding>().unwrap(), Encoding::Mapbox);
        assert_eq!(" raw16 ".parse::<Encoding>().unwrap(), Encoding::Raw16);
        assert_eq!("raw32".parse::<Encoding>().unwrap(), Encoding::Raw32);
        assert!(matches!(
            "lerc".parse::<Encoding>(),
            Err(DecodeError::UnsupportedEncoding(_))
        ));
    }

    #[test]
    fn test_encoding_display_roundtrip() {
        for enc in [
            Encoding::Terrarium,
            Encoding::Mapbox,
            Encoding::Raw16,
            Encoding::Raw32,
        ] {
            assert_eq!(enc.to_string().parse::<Encoding>().unwrap(), enc);
        }
    }

    #[test]
    fn test_terrarium_pixel_formula() {
        // 0m is R=128, G=0, B=0
        assert_eq!(Encoding::Terrarium.pixel_to_elevation(128, 0, 0), Some(0.0));
        assert_eq!(
            Encoding::Terrarium.pixel_to_elevation(128, 1, 128),
            Some(1.5)
        );
        assert_eq!(
            Encoding::Terrarium.pixel_to_elevation(0, 0, 0),
            Some(-32768.0)
        );
    }

    #[test]
    fn test_mapbox_pixel_formula() {
        // -10000 + (1*65536 + 134*256 + 160) * 0.1 = 0
        assert_eq!(Encoding::Mapbox.pixel_to_elevation(1, 134, 160), Some(0.0));
        assert_eq!(
            Encoding::Mapbox.pixel_to_elevation(0, 0, 0),
            Some(-10000.0)
        );
    }

    #[test]
    fn test_decode_parsed_image_ignores_alpha() {
        let rgba = vec![128, 0, 0, 255, 128, 0, 0, 0];
        let tile = decode_parsed_image(2, 1, Encoding::Terrarium, &rgba).unwrap();
        assert_eq!(tile.data, vec![0.0, 0.0]);
    }

    #[test]
    fn test_decode_parsed_image_length_mismatch() {
        let rgba = vec![0u8; 7];
        let err = decode_parsed_image(2, 1, Encoding::Mapbox, &rgba).unwrap_err();
        assert!(matches!(err, DecodeError::LengthMismatch { .. }));
    }

    #[test]
    fn test_decode_image_encoding_uses_image_decoder() {
        let [r, g, b] = encode_mapbox(1234.5);
        let pixels = FixedPixels(RgbaPixels {
            width: 1,
            height: 1,
            data: vec![r, g, b, 255],
        });
        let tile = decode(b"ignored", Encoding::Mapbox, &pixels).unwrap();
        assert!((tile.data[0] - 1234.5).abs() < 1e-3);
    }

    #[test]
    fn test_dem_tile_new_validates_length() {
        assert!(DemTile::new(2, 2, vec![0.0; 4]).is_ok());
        assert!(DemTile::new(2, 2, vec![0.0; 3]).is_err());
        assert!(matches!(
            DemTile::new(0, 2, vec![]),
            Err(DecodeError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn test_dem_tile_range_and_sample() {
        let tile = DemTile::new(2, 2, vec![1.0, -4.0, 7.5, f32::NAN]).unwrap();
        assert_eq!(tile.elevation_range(), Some((-4.0, 7.5)));
        assert_eq!(tile.sample(0, 1), Some(7.5));
        assert_eq!(tile.sample(2, 0), None);
    }

    #[test]
    fn test_encode_mapbox_roundtrip() {
        for elevation in [-10000.0, -12.3, 0.0, 8848.8] {
            let [r, g, b] = encode_mapbox(elevation);
            let decoded = Encoding::Mapbox.pixel_to_elevation(r, g, b).unwrap();
            assert!((decoded as f64 - elevation).abs() < 0.051, "{}", elevation);
        }
    }

    proptest! {
        #[test]
        fn prop_terrarium_roundtrip(elevation in -32768.0f64..32767.996) {
            let [r, g, b] = encode_terrarium(elevation);
            let decoded = Encoding::Terrarium.pixel_to_elevation(r, g, b).unwrap() as f64;
            // quantization step is 1/256 m
            prop_assert!((decoded - elevation).abs() <= 1.0 / 256.0 + 1e-3);
        }
    }
}

//! Image payload → RGBA pixels.

use crate::error::DecodeError;

/// Decoded RGBA8 pixels, row-major, 4 bytes per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbaPixels {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// An image-decoding facility.
///
/// The background decode worker may run without one, in which case it asks
/// the primary context to decode images on its behalf.
pub trait ImageDecoder: Send + Sync {
    /// Decodes an encoded image (PNG, WebP, ...) into RGBA8 pixels.
    fn decode_rgba(&self, bytes: &[u8]) -> Result<RgbaPixels, DecodeError>;
}

/// Image decoder backed by the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCrateDecoder;

impl ImageDecoder for ImageCrateDecoder {
    fn decode_rgba(&self, bytes: &[u8]) -> Result<RgbaPixels, DecodeError> {
        let img = image::load_from_memory(bytes).map_err(|e| DecodeError::Image(e.to_string()))?;
        let rgba = img.to_rgba8();
        Ok(RgbaPixels {
            width: rgba.width(),
            height: rgba.height(),
            data: rgba.into_raw(),
        })
    }
}

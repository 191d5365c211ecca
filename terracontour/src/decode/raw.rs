//! Raw header-prefixed elevation buffers.
//!
//! Layout: `u16` width, `u16` height (both little-endian), then
//! `width * height` samples in row-major order.

use bytes::Buf;

use super::DemTile;
use crate::error::DecodeError;

const HEADER_LEN: usize = 4;

fn read_header(bytes: &[u8], sample_size: usize) -> Result<(u32, u32, &[u8]), DecodeError> {
    if bytes.len() < HEADER_LEN {
        return Err(DecodeError::TruncatedHeader { len: bytes.len() });
    }
    let mut header = &bytes[..HEADER_LEN];
    let width = header.get_u16_le() as u32;
    let height = header.get_u16_le() as u32;
    if width == 0 || height == 0 {
        return Err(DecodeError::InvalidDimensions { width, height });
    }

    let payload = &bytes[HEADER_LEN..];
    let expected = width as usize * height as usize * sample_size;
    if payload.len() != expected {
        return Err(DecodeError::LengthMismatch {
            width,
            height,
            expected,
            actual: payload.len(),
        });
    }
    Ok((width, height, payload))
}

pub(super) fn decode_raw16(bytes: &[u8]) -> Result<DemTile, DecodeError> {
    let (width, height, mut payload) = read_header(bytes, 2)?;
    let mut data = Vec::with_capacity(width as usize * height as usize);
    while payload.has_remaining() {
        data.push(payload.get_i16_le() as f32);
    }
    DemTile::new(width, height, data)
}

pub(super) fn decode_raw32(bytes: &[u8]) -> Result<DemTile, DecodeError> {
    let (width, height, mut payload) = read_header(bytes, 4)?;
    let mut data = Vec::with_capacity(width as usize * height as usize);
    while payload.has_remaining() {
        data.push(payload.get_f32_le());
    }
    DemTile::new(width, height, data)
}

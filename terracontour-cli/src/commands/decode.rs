//! Decode command - decode a local tile file.

use std::path::Path;

use terracontour::decode::{decode, ImageCrateDecoder};
use terracontour::Encoding;

use crate::error::CliError;

/// Run the decode command.
pub fn run(path: &Path, encoding: Encoding) -> Result<(), CliError> {
    let bytes = std::fs::read(path).map_err(|error| CliError::FileRead {
        path: path.to_path_buf(),
        error,
    })?;

    let tile = decode(&bytes, encoding, &ImageCrateDecoder).map_err(CliError::Decode)?;

    println!("File:     {}", path.display());
    println!("Encoding: {}", encoding);
    println!("Size:     {}×{}", tile.width, tile.height);
    match tile.elevation_range() {
        Some((lo, hi)) => println!("Range:    {:.2} .. {:.2}", lo, hi),
        None => println!("Range:    (no finite samples)"),
    }
    Ok(())
}

//! CLI command implementations.
//!
//! - [`contours`] - Fetch a tile and print its contour lines
//! - [`decode`] - Decode a local tile file
//! - [`init`] - Write the default config file

pub mod common;
pub mod contours;
pub mod decode;
pub mod init;

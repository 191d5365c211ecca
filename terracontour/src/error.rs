//! Error types shared across the tile pipeline.
//!
//! Two layers of errors exist:
//!
//! - [`DecodeError`] describes malformed tile bytes and is produced by the
//!   pure decoder.
//! - [`DemError`] is what a tile request resolves to. It wraps decode failures
//!   and adds the request-level outcomes: network failure, timeout and
//!   caller-initiated cancellation.
//!
//! Both are `Clone` so a single failure can be delivered to every caller that
//! was coalesced onto the same in-flight request.

use std::time::Duration;

use thiserror::Error;

/// Errors raised while turning raw tile bytes into elevation samples.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The encoding tag is not one of the supported encodings.
    #[error("Unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    /// The buffer is shorter than the fixed raw header.
    #[error("Truncated header: {len} bytes (need 4)")]
    TruncatedHeader { len: usize },

    /// Payload length does not match the dimensions in the header.
    #[error("Payload length mismatch for {width}×{height}: expected {expected} bytes, got {actual}")]
    LengthMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    /// A tile must have at least one sample.
    #[error("Invalid dimensions {width}×{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// The image payload could not be decoded.
    #[error("Corrupt image payload: {0}")]
    Image(String),
}

/// Errors that a tile request can resolve to.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DemError {
    /// The tile bytes were fetched but could not be decoded.
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Network failure or non-success HTTP status.
    #[error("Fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// The request exceeded its deadline.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The caller no longer needs the result.
    #[error("Request cancelled")]
    Cancelled,

    /// The background decode context is unavailable or answered out of protocol.
    #[error("Worker error: {0}")]
    Worker(String),
}

impl DemError {
    /// Creates a fetch error for the given URL.
    pub fn fetch(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Fetch {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if the caller cancelled the request.
    ///
    /// Renderers treat cancellation as silent: the tile is simply no longer
    /// needed.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns true if the request ran out of time.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

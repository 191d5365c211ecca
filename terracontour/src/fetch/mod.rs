//! Fetch-by-URL transport.
//!
//! The tile manager only needs "give me the bytes at this URL, unless I
//! cancel first". [`TileFetcher`] is that seam; [`ReqwestFetcher`] is the
//! network implementation and tests substitute their own.

mod http;

pub use self::http::{ReqwestFetcher, DEFAULT_USER_AGENT};

use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use crate::error::DemError;
use crate::BoxFuture;

/// Retrieves raw tile bytes by URL.
///
/// Implementations should resolve to [`DemError::Cancelled`] promptly once
/// `cancel` fires, and to [`DemError::Fetch`] for network failures and
/// non-success statuses.
pub trait TileFetcher: Send + Sync {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
        cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<Bytes, DemError>>;
}

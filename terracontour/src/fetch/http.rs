//! `reqwest`-backed fetcher.

use std::time::Duration;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::TileFetcher;
use crate::error::DemError;
use crate::BoxFuture;

/// User agent sent with tile requests.
pub const DEFAULT_USER_AGENT: &str = concat!("terracontour/", env!("CARGO_PKG_VERSION"));

/// Async HTTP fetcher using a pooled `reqwest` client.
#[derive(Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    /// Creates a fetcher whose requests time out after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Result<Self, DemError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(DEFAULT_USER_AGENT)
            .pool_max_idle_per_host(32)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| DemError::fetch("", format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Wraps an existing client.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn get(&self, url: &str) -> Result<Bytes, DemError> {
        trace!(url = url, "HTTP GET request starting");

        let response = match self.client.get(url).send().await {
            Ok(resp) => {
                debug!(
                    url = url,
                    status = resp.status().as_u16(),
                    "HTTP response received"
                );
                resp
            }
            Err(e) => {
                warn!(
                    url = url,
                    error = %e,
                    is_connect = e.is_connect(),
                    is_timeout = e.is_timeout(),
                    "HTTP request failed"
                );
                return Err(DemError::fetch(url, format!("Request failed: {}", e)));
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(url = url, status = status.as_u16(), "HTTP error status");
            return Err(DemError::fetch(url, format!("HTTP {}", status)));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| DemError::fetch(url, format!("Failed to read response: {}", e)))?;
        trace!(url = url, bytes = body.len(), "HTTP body read");
        Ok(body)
    }
}

impl TileFetcher for ReqwestFetcher {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
        cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<Bytes, DemError>> {
        Box::pin(async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(url = url, "HTTP request cancelled");
                    Err(DemError::Cancelled)
                }
                result = self.get(url) => result,
            }
        })
    }
}

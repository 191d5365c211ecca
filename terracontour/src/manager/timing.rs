//! Per-request timing records.

use std::sync::Arc;
use std::time::Duration;

use crate::coord::TileCoord;
use crate::error::DemError;

/// How a request ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimingOutcome {
    Ok,
    Cancelled,
    TimedOut,
    Failed(String),
}

impl TimingOutcome {
    pub fn from_result<T>(result: &Result<T, DemError>) -> Self {
        match result {
            Ok(_) => TimingOutcome::Ok,
            Err(DemError::Cancelled) => TimingOutcome::Cancelled,
            Err(DemError::Timeout(_)) => TimingOutcome::TimedOut,
            Err(e) => TimingOutcome::Failed(e.to_string()),
        }
    }
}

/// Timing of one top-level tile request.
///
/// `fetch` and `decode` are only set for the request that drove the load.
/// Requests answered from the cache, or coalesced onto another request's
/// load, are marked `shared`.
#[derive(Debug, Clone, PartialEq)]
pub struct Timing {
    pub coord: TileCoord,
    pub url: String,
    pub fetch: Option<Duration>,
    pub decode: Option<Duration>,
    pub total: Duration,
    pub shared: bool,
    pub outcome: TimingOutcome,
}

/// Receives timing records.
pub type TimingCallback = Arc<dyn Fn(&Timing) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_from_result() {
        assert_eq!(TimingOutcome::from_result(&Ok::<(), _>(())), TimingOutcome::Ok);
        assert_eq!(
            TimingOutcome::from_result::<()>(&Err(DemError::Cancelled)),
            TimingOutcome::Cancelled
        );
        assert_eq!(
            TimingOutcome::from_result::<()>(&Err(DemError::Timeout(Duration::from_secs(1)))),
            TimingOutcome::TimedOut
        );
        assert!(matches!(
            TimingOutcome::from_result::<()>(&Err(DemError::fetch("u", "HTTP 404"))),
            TimingOutcome::Failed(_)
        ));
    }
}

//! Error taxonomy for the reconciliation engine.
//!
//! Only infrastructure problems are errors here. Business outcomes — no
//! registry match, ambiguous candidates, field conflicts — are decision
//! variants in [`crate::model`] and are never retried or raised.

use serde::Serialize;
use thiserror::Error;

/// Transport-level failure from a collaborator (registry or geocoder).
///
/// "Record not found" is not an error: the source traits return `Ok(None)`
/// or an empty Vec for a business miss, so a miss can never be confused
/// with an unknown decision after retry exhaustion.
#[derive(Error, Debug, Clone)]
pub enum SourceError {
    #[error("rate limited by remote service")]
    RateLimited,

    #[error("transient network error: {0}")]
    Transient(String),

    #[error("request timed out")]
    Timeout,

    #[error("service returned status {code}: {body}")]
    Status { code: u16, body: String },

    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl SourceError {
    /// Whether a retry could plausibly succeed.
    ///
    /// Timeouts count toward the same retry budget as other transient
    /// failures. Non-2xx statuses other than 429 (e.g. bad credentials)
    /// are not retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::Transient(_) | Self::Timeout
        )
    }
}

/// Stage of the per-record pipeline in which a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureStage {
    Matching,
    Enrichment,
}

impl std::fmt::Display for FailureStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Matching => write!(f, "matching"),
            Self::Enrichment => write!(f, "enrichment"),
        }
    }
}

/// Terminal failure for a single record after retry exhaustion.
///
/// The batch loop records one of these and moves on; it is the only failure
/// kind visible in the final report.
#[derive(Debug, Clone, Serialize)]
pub struct RecordFailure {
    pub row_id: String,
    pub stage: FailureStage,
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(SourceError::RateLimited.is_transient());
        assert!(SourceError::Transient("reset".into()).is_transient());
        assert!(SourceError::Timeout.is_transient());
        assert!(!SourceError::Status {
            code: 401,
            body: "bad key".into()
        }
        .is_transient());
        assert!(!SourceError::Decode("bad json".into()).is_transient());
    }

    #[test]
    fn test_failure_stage_display() {
        assert_eq!(FailureStage::Matching.to_string(), "matching");
        assert_eq!(FailureStage::Enrichment.to_string(), "enrichment");
    }
}

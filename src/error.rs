//! Error types for portreach.
//!
//! Uses `thiserror` for ergonomic error definitions. Per-probe failures are
//! always absorbed into a [`ScanOutcome`](crate::probe::ScanOutcome);
//! configuration errors abort the run before any work is submitted.

use crate::pool::PoolError;
use crate::probe::ScanOutcome;
use thiserror::Error;

/// Failure modes of a single port probe.
///
/// Every variant maps to exactly one outcome via [`ScanError::outcome`], so
/// a probe can never leak an error to its caller.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("name resolution failed for '{host}': {reason}")]
    Resolution { host: String, reason: String },

    #[error("no addresses found for '{0}'")]
    NoAddresses(String),

    #[error("connection timed out")]
    ConnectTimeout,

    #[error("connection rejected: {0}")]
    Rejected(#[source] std::io::Error),
}

impl ScanError {
    /// Classify this failure as a scan outcome.
    pub fn outcome(&self) -> ScanOutcome {
        match self {
            Self::ConnectTimeout => ScanOutcome::Timeout,
            Self::Rejected(_) => ScanOutcome::Closed,
            Self::Resolution { .. } | Self::NoAddresses(_) => ScanOutcome::Unknown,
        }
    }
}

/// Errors rejecting a run configuration at construction time.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("timeout must be greater than zero")]
    InvalidTimeout,

    #[error("banner buffer size must be at least 1 byte")]
    InvalidBufferSize,

    #[error(transparent)]
    Pool(#[from] PoolError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_to_outcome_mapping() {
        assert_eq!(ScanError::ConnectTimeout.outcome(), ScanOutcome::Timeout);
        assert_eq!(
            ScanError::Rejected(std::io::Error::from(std::io::ErrorKind::ConnectionRefused))
                .outcome(),
            ScanOutcome::Closed
        );
        assert_eq!(
            ScanError::NoAddresses("example.com".into()).outcome(),
            ScanOutcome::Unknown
        );
        assert_eq!(
            ScanError::Resolution {
                host: "example.com".into(),
                reason: "servfail".into()
            }
            .outcome(),
            ScanOutcome::Unknown
        );
    }
}

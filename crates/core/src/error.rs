//! Error taxonomy shared by every public operation on the shop floor.

use thiserror::Error;

/// Result type used across ledgers, counters and the production orchestrator.
pub type FloorResult<T> = Result<T, FloorError>;

/// Error surfaced to callers of ledger, counter and orchestrator operations.
///
/// The variants map one-to-one onto how a caller is expected to react:
/// configuration problems block, transient failures may be retried step by
/// step, and policy/precondition failures need different input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FloorError {
    /// The remote store has no usable configuration. Do not retry.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Transient connectivity or server failure (timeout, conflict, 5xx).
    #[error("backend error: {0}")]
    BackendError(String),

    /// The rate limiter denied the requested label quantity.
    #[error("rate limited: requested {requested} labels, limit is {limit}")]
    RateLimited { requested: u64, limit: u64 },

    /// A precondition was violated (non-positive quantity, line-free operator, ...).
    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl FloorError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::BackendUnavailable(msg.into())
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Self::BackendError(msg.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Whether retrying the single failed step can succeed without other changes.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::BackendError(_))
    }
}

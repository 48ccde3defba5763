//! Error types for orchestrated service calls.

use std::time::Duration;
use thiserror::Error;

/// Result type for orchestrated calls.
pub type Result<T> = std::result::Result<T, CallError>;

/// Transport-level failures reported by an injected [`Transport`](crate::Transport).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The attempt did not complete within its time budget.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The remote endpoint could not be reached.
    #[error("connection error: {0}")]
    Connection(String),

    /// The endpoint was reached but the exchange could not be completed.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl TransportError {
    /// Check if this is a timeout error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Check if this is a connection error.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

/// The terminal outcome of a single failed attempt.
#[derive(Debug, Clone, Error)]
pub enum AttemptError {
    /// The service answered with a non-success status.
    #[error("service responded with status {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body snippet.
        message: String,
    },

    /// The transport failed before a response was produced.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl AttemptError {
    /// Get the HTTP status code if the attempt produced a response.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport(_) => None,
        }
    }

    /// Check if the attempt failed on a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_timeout())
    }
}

/// Errors surfaced to callers of [`ServiceClient`](crate::ServiceClient).
///
/// Only call-outcome-affecting failures appear here; cache and metrics
/// degradation is absorbed by the orchestrator.
#[derive(Debug, Error)]
pub enum CallError {
    /// The circuit for the target service is open; no transport attempt was made.
    #[error("circuit for service '{service}' is open, next probe in {retry_after:?}")]
    BreakerOpen {
        /// Target service name.
        service: String,
        /// Time until the breaker admits its next probe.
        retry_after: Duration,
    },

    /// Every permitted attempt failed with a retryable outcome, or the call
    /// deadline elapsed.
    #[error("call to '{service}' failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Target service name.
        service: String,
        /// Number of attempts made.
        attempts: u32,
        /// The last underlying outcome.
        last: AttemptError,
    },

    /// A non-retryable failure occurred; no retry was attempted.
    #[error("non-retryable failure calling '{service}'")]
    Fatal {
        /// Target service name.
        service: String,
        /// The underlying outcome, verbatim.
        #[source]
        source: AttemptError,
    },

    /// The request could not be constructed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A response body could not be decoded.
    #[error("failed to decode response body: {0}")]
    Decode(String),
}

impl CallError {
    /// Check if the call was rejected by an open circuit.
    pub fn is_breaker_open(&self) -> bool {
        matches!(self, Self::BreakerOpen { .. })
    }

    /// Time until the breaker admits its next probe, if the call was rejected.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::BreakerOpen { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }

    /// Get the HTTP status code of the underlying outcome, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::RetriesExhausted { last, .. } => last.status_code(),
            Self::Fatal { source, .. } => source.status_code(),
            _ => None,
        }
    }
}

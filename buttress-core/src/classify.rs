//! Outcome classification.
//!
//! Classification is the hinge of the whole engine: "my request was bad"
//! (fatal) and "the service is down" (retryable) must never be conflated,
//! or client errors start tripping circuits for healthy services.

use crate::error::TransportError;
use crate::response::ServiceResponse;
use http::StatusCode;
use std::collections::HashSet;
use std::sync::Arc;

/// How a completed attempt is treated by the retry loop and the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// The response satisfies the success predicate; the call ends here.
    Success,
    /// A transient failure: eligible for retry and counted by the breaker.
    Retryable,
    /// A terminal failure: never retried, excluded from the breaker by default.
    Fatal,
}

/// Strategy mapping raw attempt outcomes onto [`Classification`]s.
///
/// Injected into the orchestrator so classification rules can come from
/// configuration rather than hard-wired status checks.
pub trait FailureClassifier: Send + Sync {
    /// Classify one attempt outcome.
    fn classify(&self, outcome: Result<&ServiceResponse, &TransportError>) -> Classification;
}

/// Predicate deciding whether a response status counts as success.
pub type SuccessPredicate = Arc<dyn Fn(StatusCode) -> bool + Send + Sync>;

/// Default classifier.
///
/// Timeouts, connection errors, and protocol errors are retryable; statuses
/// in the retryable set (502/503/504 by default) are retryable; 2xx is
/// success; everything else (400/401/404/500, ...) is fatal.
#[derive(Clone)]
pub struct StatusClassifier {
    retryable_statuses: HashSet<u16>,
    is_success: SuccessPredicate,
}

impl StatusClassifier {
    /// Create a classifier with the given retryable status codes.
    pub fn new(retryable_statuses: impl IntoIterator<Item = u16>) -> Self {
        Self {
            retryable_statuses: retryable_statuses.into_iter().collect(),
            is_success: Arc::new(|status| status.is_success()),
        }
    }

    /// Replace the success predicate.
    pub fn with_success_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(StatusCode) -> bool + Send + Sync + 'static,
    {
        self.is_success = Arc::new(predicate);
        self
    }

    /// Check whether a status code is in the retryable set.
    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retryable_statuses.contains(&status)
    }
}

impl Default for StatusClassifier {
    fn default() -> Self {
        Self::new([502, 503, 504])
    }
}

impl std::fmt::Debug for StatusClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusClassifier")
            .field("retryable_statuses", &self.retryable_statuses)
            .finish()
    }
}

impl FailureClassifier for StatusClassifier {
    fn classify(&self, outcome: Result<&ServiceResponse, &TransportError>) -> Classification {
        match outcome {
            Err(_) => Classification::Retryable,
            Ok(response) => {
                let status = response.status();
                if self.retryable_statuses.contains(&status.as_u16()) {
                    Classification::Retryable
                } else if (self.is_success)(status) {
                    Classification::Success
                } else {
                    Classification::Fatal
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::HeaderMap;
    use std::time::Duration;

    fn response(status: u16) -> ServiceResponse {
        ServiceResponse::new(
            StatusCode::from_u16(status).unwrap(),
            HeaderMap::new(),
            Bytes::new(),
        )
    }

    #[test]
    fn test_transport_errors_are_retryable() {
        let classifier = StatusClassifier::default();
        let timeout = TransportError::Timeout(Duration::from_secs(5));
        let connection = TransportError::Connection("refused".to_string());

        assert_eq!(classifier.classify(Err(&timeout)), Classification::Retryable);
        assert_eq!(
            classifier.classify(Err(&connection)),
            Classification::Retryable
        );
    }

    #[test]
    fn test_default_status_classification() {
        let classifier = StatusClassifier::default();

        assert_eq!(
            classifier.classify(Ok(&response(200))),
            Classification::Success
        );
        assert_eq!(
            classifier.classify(Ok(&response(204))),
            Classification::Success
        );
        for status in [502, 503, 504] {
            assert_eq!(
                classifier.classify(Ok(&response(status))),
                Classification::Retryable
            );
        }
        for status in [400, 401, 404, 500] {
            assert_eq!(
                classifier.classify(Ok(&response(status))),
                Classification::Fatal
            );
        }
    }

    #[test]
    fn test_custom_retryable_statuses() {
        let classifier = StatusClassifier::new([429, 503]);
        assert_eq!(
            classifier.classify(Ok(&response(429))),
            Classification::Retryable
        );
        // 502 no longer retryable once the set is replaced
        assert_eq!(
            classifier.classify(Ok(&response(502))),
            Classification::Fatal
        );
    }

    #[test]
    fn test_custom_success_predicate() {
        let classifier =
            StatusClassifier::default().with_success_predicate(|status| status.as_u16() < 500);
        assert_eq!(
            classifier.classify(Ok(&response(404))),
            Classification::Success
        );
    }
}

//! Transport abstraction.

use crate::error::TransportError;
use crate::request::ServiceRequest;
use crate::response::ServiceResponse;
use async_trait::async_trait;

/// Executor for a fully-resolved request.
///
/// Implementations own URL resolution, connection management, TLS, and
/// authentication; the orchestrator only decides whether and when to call
/// [`Transport::execute`]. Cancellation is cooperative: when the per-attempt
/// time budget elapses, the orchestrator drops the in-flight future and
/// reports a timeout outcome.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform the network call.
    async fn execute(&self, request: &ServiceRequest) -> Result<ServiceResponse, TransportError>;
}

//! # Buttress Core
//!
//! The call orchestration engine behind Buttress: a resilience layer for
//! service-to-service calls routed through an API gateway. Every outbound
//! call runs through one pipeline — response cache, circuit breaker, retry
//! with jittered exponential backoff, and per-attempt metrics — so callers
//! never hand-roll this logic per call-site.
//!
//! ## Features
//!
//! - **Per-service circuit breakers**: rolling-window failure ratio, lazy
//!   open → half-open transitions, single-probe recovery
//! - **Retry with Backoff**: exponential growth, capped, jittered to avoid
//!   synchronized retry storms
//! - **Response Cache**: fingerprint-keyed TTL cache for idempotent reads
//! - **Failure Classification**: retryable vs. fatal, so caller errors never
//!   trip circuits
//! - **Injected collaborators**: transport, clock, metrics sink, and
//!   classifier are traits, virtualizable in tests
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use buttress_core::{ClientConfig, ServiceClient, Transport};
//! use std::sync::Arc;
//!
//! # fn transport() -> Arc<dyn Transport> { unimplemented!() }
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ServiceClient::new(ClientConfig::default(), transport());
//!
//!     let listings = client
//!         .get("listings", "/api/v1/listings")
//!         .query("city", "dubai")
//!         .send()
//!         .await?;
//!
//!     println!("status: {}", listings.status());
//!     Ok(())
//! }
//! ```
//!
//! ## Tuning the pipeline
//!
//! ```rust,no_run
//! use buttress_core::{ClientConfig, ServiceClient, Transport};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # fn transport() -> Arc<dyn Transport> { unimplemented!() }
//! let config = ClientConfig::builder()
//!     .max_attempts(5)
//!     .base_delay(Duration::from_millis(50))
//!     .failure_ratio(0.5)
//!     .cool_down(Duration::from_secs(15))
//!     .default_cache_ttl(Duration::from_secs(30))
//!     .build();
//!
//! let client = ServiceClient::new(config, transport());
//! ```

mod breaker;
mod cache;
mod classify;
mod client;
mod clock;
mod config;
mod error;
mod fingerprint;
mod metrics;
mod registry;
mod request;
mod response;
mod retry;
mod transport;

pub use breaker::{Admission, BreakerConfig, BreakerStats, CircuitBreaker, CircuitState};
pub use cache::ResponseCache;
pub use classify::{Classification, FailureClassifier, StatusClassifier, SuccessPredicate};
pub use client::{ServiceClient, ServiceClientBuilder};
pub use clock::{Clock, TokioClock};
pub use config::{CacheConfig, ClientConfig, ClientConfigBuilder, ServiceOverrides};
pub use error::{AttemptError, CallError, Result, TransportError};
pub use fingerprint::Fingerprint;
pub use metrics::{CallEvent, EventKind, MetricsCollector, MetricsSink, MetricsSnapshot, NoopMetrics};
pub use registry::BreakerRegistry;
pub use request::{CallBuilder, CallOptions, ServiceRequest};
pub use response::ServiceResponse;
pub use retry::{RetryBudget, RetryConfig};
pub use transport::Transport;

// Re-export common types
pub use bytes::Bytes;
pub use http::{header, HeaderMap, HeaderValue, Method, StatusCode};

/// Prelude for common imports.
///
/// ```
/// use buttress_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::breaker::{BreakerConfig, CircuitState};
    pub use crate::classify::{Classification, FailureClassifier, StatusClassifier};
    pub use crate::client::{ServiceClient, ServiceClientBuilder};
    pub use crate::clock::{Clock, TokioClock};
    pub use crate::config::{CacheConfig, ClientConfig, ServiceOverrides};
    pub use crate::error::{AttemptError, CallError, Result, TransportError};
    pub use crate::metrics::{CallEvent, EventKind, MetricsCollector, MetricsSink, NoopMetrics};
    pub use crate::request::{CallOptions, ServiceRequest};
    pub use crate::response::ServiceResponse;
    pub use crate::retry::RetryConfig;
    pub use crate::transport::Transport;
    pub use http::{header, HeaderMap, HeaderValue, Method, StatusCode};
}

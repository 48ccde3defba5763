// Buttress - a resilience layer for gateway-routed microservice calls
//
// This library composes per-service circuit breakers, retry with jittered
// backoff, and TTL response caching into a single per-call pipeline.

// Re-export the orchestration engine
pub use buttress_core::*;

// Re-export optional crates
#[cfg(feature = "gateway")]
pub use buttress_gateway;

#[cfg(feature = "gateway")]
pub use buttress_gateway::{GatewayConfig, GatewayTransport};

// Prelude for common imports
pub mod prelude {
    pub use crate::{
        AttemptError,
        BreakerConfig,
        CacheConfig,
        CallError,
        CallEvent,
        CallOptions,
        CircuitState,
        Classification,
        ClientConfig,
        Clock,
        EventKind,
        FailureClassifier,
        HeaderMap,
        Method,
        MetricsCollector,
        MetricsSink,
        NoopMetrics,
        Result,
        RetryConfig,
        ServiceClient,
        ServiceOverrides,
        ServiceRequest,
        ServiceResponse,
        StatusClassifier,
        StatusCode,
        TokioClock,
        Transport,
        TransportError,
    };

    #[cfg(feature = "gateway")]
    pub use crate::{GatewayConfig, GatewayTransport};
}

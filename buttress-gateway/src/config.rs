//! Gateway transport configuration.

use std::time::Duration;

/// Configuration for [`GatewayTransport`](crate::GatewayTransport).
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// API gateway base URL, e.g. `https://gateway.internal:8443`.
    pub gateway_url: String,
    /// Name of the calling service, sent as `X-Service-Name`.
    pub service_name: String,
    /// Service authentication token, sent as `X-Service-Token`.
    pub service_token: String,
    /// Transport-level safety-net timeout per request. The orchestrator
    /// enforces its own per-attempt budget on top of this.
    pub timeout: Duration,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Connection pool idle timeout.
    pub pool_idle_timeout: Duration,
    /// Maximum idle connections per host.
    pub pool_max_idle_per_host: usize,
    /// User agent string.
    pub user_agent: String,
    /// Enable gzip decompression.
    pub gzip: bool,
}

impl GatewayConfig {
    /// Create a configuration for a gateway and calling-service identity.
    pub fn new(
        gateway_url: impl Into<String>,
        service_name: impl Into<String>,
        service_token: impl Into<String>,
    ) -> Self {
        Self {
            gateway_url: gateway_url.into(),
            service_name: service_name.into(),
            service_token: service_token.into(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            pool_idle_timeout: Duration::from_secs(90),
            pool_max_idle_per_host: 32,
            user_agent: format!("buttress-gateway/{}", env!("CARGO_PKG_VERSION")),
            gzip: true,
        }
    }

    /// Set the transport-level request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the connection pool idle timeout.
    pub fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_idle_timeout = timeout;
        self
    }

    /// Set the maximum idle connections per host.
    pub fn pool_max_idle_per_host(mut self, max: usize) -> Self {
        self.pool_max_idle_per_host = max;
        self
    }

    /// Set the user agent string.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Enable or disable gzip decompression.
    pub fn gzip(mut self, enable: bool) -> Self {
        self.gzip = enable;
        self
    }
}

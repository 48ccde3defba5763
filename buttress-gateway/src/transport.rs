//! Gateway-routed transport implementation.

use crate::GatewayConfig;
use async_trait::async_trait;
use buttress_core::{ServiceRequest, ServiceResponse, Transport, TransportError};
use tracing::debug;
use url::Url;

/// [`Transport`] that routes every request through an API gateway.
///
/// The request's service name selects the gateway route
/// (`{gateway}/gateway/{service}{path}`); the calling service's identity
/// travels as `X-Service-Name`/`X-Service-Token`, and every request carries
/// a fresh `X-Request-ID` for correlation. Token issuance and rotation are
/// someone else's job; this transport only attaches what it was given.
pub struct GatewayTransport {
    client: reqwest::Client,
    config: GatewayConfig,
    base: Url,
}

impl GatewayTransport {
    /// Build the transport and its connection pool.
    pub fn new(config: GatewayConfig) -> Result<Self, TransportError> {
        let base = Url::parse(config.gateway_url.trim_end_matches('/'))
            .map_err(|e| TransportError::Protocol(format!("invalid gateway URL: {e}")))?;

        let mut builder = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .user_agent(&config.user_agent);

        if config.gzip {
            builder = builder.gzip(true);
        }

        let client = builder
            .build()
            .map_err(|e| TransportError::Protocol(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            base,
        })
    }

    /// The configuration this transport was built with.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    fn build_url(&self, request: &ServiceRequest) -> Result<Url, TransportError> {
        let path = if request.path.starts_with('/') {
            request.path.clone()
        } else {
            format!("/{}", request.path)
        };
        let mut url = Url::parse(&format!(
            "{}/gateway/{}{}",
            self.base.as_str().trim_end_matches('/'),
            request.service,
            path
        ))
        .map_err(|e| TransportError::Protocol(format!("invalid request URL: {e}")))?;

        if !request.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &request.query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl Transport for GatewayTransport {
    async fn execute(&self, request: &ServiceRequest) -> Result<ServiceResponse, TransportError> {
        let url = self.build_url(request)?;
        let request_id = uuid::Uuid::new_v4().to_string();
        debug!(
            service = %request.service,
            method = %request.method,
            url = %url,
            request_id = %request_id,
            "dispatching gateway request"
        );

        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .header("X-Service-Name", &self.config.service_name)
            .header("X-Service-Token", &self.config.service_token)
            .header("X-Request-ID", &request_id);

        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        if let Some(body) = &request.body {
            if !request.headers.contains_key(http::header::CONTENT_TYPE) {
                builder = builder.header(http::header::CONTENT_TYPE, "application/json");
            }
            builder = builder.body(body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| self.map_error(e))?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(|e| self.map_error(e))?;

        Ok(ServiceResponse::new(status, headers, body))
    }
}

impl GatewayTransport {
    fn map_error(&self, error: reqwest::Error) -> TransportError {
        if error.is_timeout() {
            TransportError::Timeout(self.config.timeout)
        } else if error.is_connect() {
            TransportError::Connection(error.to_string())
        } else {
            TransportError::Protocol(error.to_string())
        }
    }
}

//! Request descriptors and the per-call builder.

use crate::client::ServiceClient;
use crate::error::{CallError, Result};
use crate::response::ServiceResponse;
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::Serialize;
use std::time::Duration;

/// A fully-described call to a downstream service.
///
/// Requests are addressed by service name; URL resolution belongs to the
/// transport.
#[derive(Debug, Clone)]
pub struct ServiceRequest {
    /// Downstream service this request targets.
    pub service: String,
    /// HTTP method.
    pub method: Method,
    /// Path below the service root, e.g. `/api/v1/listings`.
    pub path: String,
    /// Query parameters, in insertion order.
    pub query: Vec<(String, String)>,
    /// Request headers.
    pub headers: HeaderMap,
    /// Request body, if any.
    pub body: Option<Bytes>,
}

impl ServiceRequest {
    /// Create a request descriptor.
    pub fn new(service: impl Into<String>, method: Method, path: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Add a query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Add a header. Invalid names or values are ignored.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::try_from(name.as_ref()),
            HeaderValue::try_from(value.as_ref()),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Set the request body as raw bytes.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set the request body as JSON.
    pub fn json<T: Serialize>(self, body: &T) -> Result<Self> {
        let bytes = serde_json::to_vec(body)
            .map_err(|e| CallError::InvalidRequest(format!("JSON body: {e}")))?;
        Ok(self
            .header("content-type", "application/json")
            .body(bytes))
    }
}

/// Per-call overrides layered over the client configuration.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Override the maximum number of attempts.
    pub max_attempts: Option<u32>,
    /// Override the overall call deadline.
    pub deadline: Option<Duration>,
    /// Override the per-attempt timeout.
    pub timeout: Option<Duration>,
    /// Override the TTL used when caching a successful response.
    pub cache_ttl: Option<Duration>,
    /// Force cache participation on or off for this call.
    pub cache: Option<bool>,
    /// Disable the circuit breaker for this call when `Some(false)`.
    pub breaker: Option<bool>,
    /// Disable retries for this call when `Some(false)`; a single attempt is
    /// still made.
    pub retry: Option<bool>,
}

/// Builder returned by the [`ServiceClient`] verb helpers.
///
/// Collects the request descriptor and per-call overrides, then executes the
/// orchestrated call with [`CallBuilder::send`].
pub struct CallBuilder<'a> {
    client: &'a ServiceClient,
    request: ServiceRequest,
    options: CallOptions,
    error: Option<CallError>,
}

impl<'a> CallBuilder<'a> {
    pub(crate) fn new(
        client: &'a ServiceClient,
        method: Method,
        service: String,
        path: String,
    ) -> Self {
        Self {
            client,
            request: ServiceRequest::new(service, method, path),
            options: CallOptions::default(),
            error: None,
        }
    }

    /// Add a query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.request = self.request.query(key, value);
        self
    }

    /// Add multiple query parameters.
    pub fn queries<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in params {
            self.request = self.request.query(key, value);
        }
        self
    }

    /// Add a header. Invalid names or values are ignored.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.request = self.request.header(name, value);
        self
    }

    /// Set the request body as raw bytes.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.request = self.request.body(body);
        self
    }

    /// Set the request body as JSON. Serialization failures surface when the
    /// call is sent.
    pub fn json<T: Serialize>(mut self, body: &T) -> Self {
        match serde_json::to_vec(body) {
            Ok(bytes) => {
                self.request.headers.insert(
                    http::header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                );
                self.request.body = Some(bytes.into());
            }
            Err(e) => self.error = Some(CallError::InvalidRequest(format!("JSON body: {e}"))),
        }
        self
    }

    /// Override the per-attempt timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = Some(timeout);
        self
    }

    /// Override the overall call deadline.
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.options.deadline = Some(deadline);
        self
    }

    /// Override the maximum number of attempts.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.options.max_attempts = Some(attempts);
        self
    }

    /// Override the TTL used when caching a successful response.
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.options.cache_ttl = Some(ttl);
        self
    }

    /// Skip the cache for this call.
    pub fn no_cache(mut self) -> Self {
        self.options.cache = Some(false);
        self
    }

    /// Skip the circuit breaker for this call.
    pub fn no_breaker(mut self) -> Self {
        self.options.breaker = Some(false);
        self
    }

    /// Make a single attempt only.
    pub fn no_retry(mut self) -> Self {
        self.options.retry = Some(false);
        self
    }

    /// Execute the orchestrated call.
    pub async fn send(self) -> Result<ServiceResponse> {
        if let Some(error) = self.error {
            return Err(error);
        }
        self.client.call_with(self.request, self.options).await
    }

    /// Split into the raw request and options without executing.
    pub fn into_parts(self) -> Result<(ServiceRequest, CallOptions)> {
        if let Some(error) = self.error {
            return Err(error);
        }
        Ok((self.request, self.options))
    }
}

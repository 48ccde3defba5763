//! The call orchestrator.

use std::sync::Arc;
use std::time::Duration;

use http::Method;
use tracing::{debug, warn};

use crate::breaker::{Admission, BreakerStats, CircuitBreaker, CircuitState};
use crate::cache::ResponseCache;
use crate::classify::{Classification, FailureClassifier, StatusClassifier};
use crate::clock::{Clock, TokioClock};
use crate::config::ClientConfig;
use crate::error::{AttemptError, CallError, Result, TransportError};
use crate::fingerprint::Fingerprint;
use crate::metrics::{CallEvent, EventKind, MetricsSink, NoopMetrics};
use crate::registry::BreakerRegistry;
use crate::request::{CallBuilder, CallOptions, ServiceRequest};
use crate::response::ServiceResponse;
use crate::retry::RetryBudget;
use crate::transport::Transport;

/// Maximum number of body characters carried in attempt errors.
const BODY_SNIPPET_LEN: usize = 200;

/// Orchestrates calls to downstream services.
///
/// Per call: cache fast path, circuit breaker admission, transport execution
/// with a per-attempt time budget, outcome classification, breaker and cache
/// updates, retry with jittered backoff, and one metrics event per attempt.
///
/// One `ServiceClient` is shared per process. Breakers are keyed by service
/// name, created on first use, and live for the client's lifetime; cloning
/// the client clones a handle to the same shared state.
#[derive(Clone)]
pub struct ServiceClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    classifier: Arc<dyn FailureClassifier>,
    clock: Arc<dyn Clock>,
    metrics: Arc<dyn MetricsSink>,
    breakers: BreakerRegistry,
    cache: ResponseCache,
}

impl ServiceClient {
    /// Create a client with the default classifier, tokio clock, and no-op
    /// metrics sink.
    pub fn new(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self::builder(transport).config(config).build()
    }

    /// Create a client builder for injecting classifier, clock, or metrics.
    pub fn builder(transport: Arc<dyn Transport>) -> ServiceClientBuilder {
        ServiceClientBuilder::new(transport)
    }

    /// Get the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Create a GET call builder.
    pub fn get(&self, service: impl Into<String>, path: impl Into<String>) -> CallBuilder<'_> {
        self.request(Method::GET, service, path)
    }

    /// Create a HEAD call builder.
    pub fn head(&self, service: impl Into<String>, path: impl Into<String>) -> CallBuilder<'_> {
        self.request(Method::HEAD, service, path)
    }

    /// Create a POST call builder.
    pub fn post(&self, service: impl Into<String>, path: impl Into<String>) -> CallBuilder<'_> {
        self.request(Method::POST, service, path)
    }

    /// Create a PUT call builder.
    pub fn put(&self, service: impl Into<String>, path: impl Into<String>) -> CallBuilder<'_> {
        self.request(Method::PUT, service, path)
    }

    /// Create a PATCH call builder.
    pub fn patch(&self, service: impl Into<String>, path: impl Into<String>) -> CallBuilder<'_> {
        self.request(Method::PATCH, service, path)
    }

    /// Create a DELETE call builder.
    pub fn delete(&self, service: impl Into<String>, path: impl Into<String>) -> CallBuilder<'_> {
        self.request(Method::DELETE, service, path)
    }

    /// Create a call builder with a custom method.
    pub fn request(
        &self,
        method: Method,
        service: impl Into<String>,
        path: impl Into<String>,
    ) -> CallBuilder<'_> {
        CallBuilder::new(self, method, service.into(), path.into())
    }

    /// Execute a described request with default options.
    pub async fn call(&self, request: ServiceRequest) -> Result<ServiceResponse> {
        self.call_with(request, CallOptions::default()).await
    }

    /// Execute several calls concurrently, returning one result per request
    /// in input order.
    pub async fn call_many<I>(&self, requests: I) -> Vec<Result<ServiceResponse>>
    where
        I: IntoIterator<Item = ServiceRequest>,
    {
        futures::future::join_all(requests.into_iter().map(|request| self.call(request))).await
    }

    /// Execute a described request with per-call overrides.
    pub async fn call_with(
        &self,
        request: ServiceRequest,
        options: CallOptions,
    ) -> Result<ServiceResponse> {
        let inner = &self.inner;
        let service = request.service.clone();

        let cache_eligible = options.cache.unwrap_or(inner.config.cache.enabled)
            && inner.config.cache.eligible_methods.contains(&request.method);
        let fingerprint = cache_eligible.then(|| Fingerprint::of(&request));

        // The cache fast path: a live hit ends the call with no breaker
        // check and no transport attempt.
        if let Some(fingerprint) = &fingerprint {
            if let Some(hit) = inner.cache.get(fingerprint, inner.clock.now()) {
                debug!(service = %service, "cache hit");
                self.emit(&service, EventKind::CacheHit, None, None, None);
                return Ok(hit);
            }
            self.emit(&service, EventKind::CacheMiss, None, None, None);
        }

        let breaker = if options.breaker.unwrap_or(true) {
            Some(inner.breakers.breaker_for(&service, inner.clock.now()))
        } else {
            None
        };

        let max_attempts = if options.retry.unwrap_or(true) {
            options
                .max_attempts
                .unwrap_or(inner.config.retry.max_attempts)
                .max(1)
        } else {
            1
        };
        let deadline = options.deadline.unwrap_or(inner.config.call_deadline);
        let attempt_timeout = options
            .timeout
            .unwrap_or_else(|| inner.config.request_timeout_for(&service));

        let mut budget = RetryBudget::new(max_attempts, deadline, inner.clock.now());
        let mut last: Option<AttemptError> = None;

        loop {
            // No attempt starts past the call deadline.
            let now = inner.clock.now();
            if budget.deadline_elapsed(now) {
                let last = last
                    .clone()
                    .unwrap_or(AttemptError::Transport(TransportError::Timeout(deadline)));
                let error = CallError::RetriesExhausted {
                    service: service.clone(),
                    attempts: budget.attempts(),
                    last,
                };
                return self.fail(&service, fingerprint.as_ref(), error);
            }
            let attempt = budget.start_attempt();

            // Breaker admission, re-checked before every attempt, not just
            // the first.
            let probe = match breaker.as_deref().map(|b| b.admit(now)) {
                None | Some(Admission::Allowed) => false,
                Some(Admission::AllowedProbe) => {
                    debug!(service = %service, "probing half-open circuit");
                    true
                }
                Some(Admission::Rejected { retry_after }) => {
                    warn!(service = %service, retry_after = ?retry_after, "circuit open, failing fast");
                    self.emit(
                        &service,
                        EventKind::BreakerRejected,
                        Some(attempt),
                        None,
                        breaker.as_deref(),
                    );
                    let error = CallError::BreakerOpen {
                        service: service.clone(),
                        retry_after,
                    };
                    return self.fail(&service, fingerprint.as_ref(), error);
                }
            };

            // Execute, racing the transport against the attempt time budget.
            // Dropping the transport future is the cancellation request.
            let per_attempt = attempt_timeout.min(budget.remaining(now));
            let started = inner.clock.now();
            let outcome = tokio::select! {
                outcome = inner.transport.execute(&request) => outcome,
                _ = inner.clock.sleep(per_attempt) => Err(TransportError::Timeout(per_attempt)),
            };
            let finished = inner.clock.now();
            let latency = finished.duration_since(started);

            // Classify, then report to the breaker while the probe slot is
            // still ours.
            let classification = inner.classifier.classify(outcome.as_ref());
            if let Some(breaker) = breaker.as_deref() {
                breaker.record(classification, probe, finished);
            }
            let kind = match classification {
                Classification::Success => EventKind::Success,
                Classification::Retryable => EventKind::RetryableFailure,
                Classification::Fatal => EventKind::FatalFailure,
            };
            self.emit(&service, kind, Some(attempt), Some(latency), breaker.as_deref());

            let error = match (classification, outcome) {
                (Classification::Success, Ok(response)) => {
                    // Only Success outcomes populate the cache, and only
                    // after classification.
                    if let Some(fingerprint) = &fingerprint {
                        let ttl = options.cache_ttl.unwrap_or(inner.config.cache.default_ttl);
                        inner.cache.put(
                            fingerprint.clone(),
                            response.clone(),
                            ttl,
                            inner.clock.now(),
                        );
                    }
                    if attempt > 1 {
                        debug!(service = %service, attempt, "call succeeded after retry");
                    }
                    return Ok(response);
                }
                // A transport error classified as success has no response to
                // return; treat it as a retryable failure.
                (_, outcome) => attempt_error(outcome),
            };

            if classification == Classification::Fatal {
                let error = CallError::Fatal {
                    service: service.clone(),
                    source: error,
                };
                return self.fail(&service, fingerprint.as_ref(), error);
            }

            if !inner
                .config
                .retry
                .should_retry(&budget, Classification::Retryable, inner.clock.now())
            {
                let error = CallError::RetriesExhausted {
                    service: service.clone(),
                    attempts: budget.attempts(),
                    last: error,
                };
                return self.fail(&service, fingerprint.as_ref(), error);
            }

            last = Some(error);
            let delay = inner.config.retry.delay_for_attempt(attempt);
            debug!(service = %service, attempt, delay = ?delay, "retrying after backoff");
            inner.clock.sleep(delay).await;
        }
    }

    /// Breaker phase for a service, if it has been called.
    pub fn breaker_state(&self, service: &str) -> Option<CircuitState> {
        self.inner
            .breakers
            .get(service)
            .map(|breaker| breaker.state(self.inner.clock.now()))
    }

    /// Breaker snapshot for a service, if it has been called.
    pub fn breaker_stats(&self, service: &str) -> Option<BreakerStats> {
        self.inner
            .breakers
            .get(service)
            .map(|breaker| breaker.stats(self.inner.clock.now()))
    }

    /// Force a service's breaker back to closed. Returns false if the
    /// service has never been called.
    pub fn reset_breaker(&self, service: &str) -> bool {
        self.inner.breakers.reset(service, self.inner.clock.now())
    }

    /// Drop every cached response.
    pub fn clear_cache(&self) {
        self.inner.cache.clear();
    }

    /// Drop every cached response for one service.
    pub fn purge_service_cache(&self, service: &str) {
        self.inner.cache.purge_service(service);
    }

    /// Drop the cached response matching a request, if any. Useful after a
    /// mutation that makes a cached read stale before its TTL.
    pub fn invalidate_cached(&self, request: &ServiceRequest) -> bool {
        self.inner.cache.invalidate(&Fingerprint::of(request))
    }

    /// Drop expired cache entries to bound memory.
    pub fn purge_expired_cache(&self) {
        self.inner.cache.purge_expired(self.inner.clock.now());
    }

    fn emit(
        &self,
        service: &str,
        kind: EventKind,
        attempt: Option<u32>,
        latency: Option<Duration>,
        breaker: Option<&CircuitBreaker>,
    ) {
        let breaker_state = breaker.map(|b| b.state(self.inner.clock.now()));
        self.inner.metrics.record(&CallEvent {
            service: service.to_string(),
            kind,
            attempt,
            latency,
            breaker_state,
        });
    }

    /// Terminal failure path. With `fallback_to_cache` enabled, a still-live
    /// cached response is served instead of the error.
    fn fail(
        &self,
        service: &str,
        fingerprint: Option<&Fingerprint>,
        error: CallError,
    ) -> Result<ServiceResponse> {
        if self.inner.config.cache.fallback_to_cache
            && let Some(fingerprint) = fingerprint
            && let Some(hit) = self.inner.cache.get(fingerprint, self.inner.clock.now())
        {
            debug!(service = %service, error = %error, "serving cached response after failure");
            return Ok(hit);
        }
        Err(error)
    }
}

impl std::fmt::Debug for ServiceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceClient")
            .field("config", &self.inner.config)
            .field("breakers", &self.inner.breakers)
            .finish()
    }
}

fn attempt_error(outcome: std::result::Result<ServiceResponse, TransportError>) -> AttemptError {
    match outcome {
        Err(error) => AttemptError::Transport(error),
        Ok(response) => {
            let status = response.status().as_u16();
            let message: String = String::from_utf8_lossy(response.bytes())
                .chars()
                .take(BODY_SNIPPET_LEN)
                .collect();
            AttemptError::Status { status, message }
        }
    }
}

/// Builder for [`ServiceClient`].
pub struct ServiceClientBuilder {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    classifier: Option<Arc<dyn FailureClassifier>>,
    clock: Option<Arc<dyn Clock>>,
    metrics: Option<Arc<dyn MetricsSink>>,
}

impl ServiceClientBuilder {
    fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            config: ClientConfig::default(),
            transport,
            classifier: None,
            clock: None,
            metrics: None,
        }
    }

    /// Set the client configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Inject a failure classifier. Defaults to [`StatusClassifier`] built
    /// from the configured retryable status codes.
    pub fn classifier(mut self, classifier: Arc<dyn FailureClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Inject a clock. Defaults to [`TokioClock`].
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Inject a metrics sink. Defaults to [`NoopMetrics`].
    pub fn metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build the client.
    pub fn build(self) -> ServiceClient {
        let classifier = self.classifier.unwrap_or_else(|| {
            Arc::new(StatusClassifier::new(
                self.config.retryable_status_codes.iter().copied(),
            ))
        });
        let breakers = BreakerRegistry::new(
            self.config.breaker.clone(),
            self.config.breaker_overrides(),
        );

        ServiceClient {
            inner: Arc::new(ClientInner {
                transport: self.transport,
                classifier,
                clock: self.clock.unwrap_or_else(|| Arc::new(TokioClock)),
                metrics: self.metrics.unwrap_or_else(|| Arc::new(NoopMetrics)),
                breakers,
                cache: ResponseCache::new(),
                config: self.config,
            }),
        }
    }
}

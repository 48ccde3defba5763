//! Client configuration.

use crate::breaker::BreakerConfig;
use crate::retry::RetryConfig;
use http::Method;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// Cache behavior configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Whether the cache participates in calls at all.
    pub enabled: bool,
    /// TTL applied when a call does not override it.
    pub default_ttl: Duration,
    /// Methods whose responses may be cached. Only idempotent reads belong
    /// here.
    pub eligible_methods: HashSet<Method>,
    /// Serve a still-live cached response instead of surfacing a retryable
    /// or fatal failure.
    pub fallback_to_cache: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_ttl: Duration::from_secs(60),
            eligible_methods: [Method::GET, Method::HEAD].into_iter().collect(),
            fallback_to_cache: false,
        }
    }
}

/// Per-service overrides layered over the client defaults.
#[derive(Debug, Clone, Default)]
pub struct ServiceOverrides {
    /// Breaker configuration for this service.
    pub breaker: Option<BreakerConfig>,
    /// Per-attempt timeout for this service.
    pub request_timeout: Option<Duration>,
}

/// Top-level configuration for [`ServiceClient`](crate::ServiceClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Retry and backoff policy.
    pub retry: RetryConfig,
    /// Default circuit breaker policy.
    pub breaker: BreakerConfig,
    /// Cache policy.
    pub cache: CacheConfig,
    /// Status codes the default classifier treats as retryable.
    pub retryable_status_codes: HashSet<u16>,
    /// Per-attempt transport time budget.
    pub request_timeout: Duration,
    /// Overall per-call deadline.
    pub call_deadline: Duration,
    /// Per-service overrides, keyed by service name.
    pub service_overrides: HashMap<String, ServiceOverrides>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            breaker: BreakerConfig::default(),
            cache: CacheConfig::default(),
            retryable_status_codes: [502, 503, 504].into_iter().collect(),
            request_timeout: Duration::from_secs(30),
            call_deadline: Duration::from_secs(60),
            service_overrides: HashMap::new(),
        }
    }
}

impl ClientConfig {
    /// Create a configuration builder.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Per-attempt timeout for a service, honoring overrides.
    pub(crate) fn request_timeout_for(&self, service: &str) -> Duration {
        self.service_overrides
            .get(service)
            .and_then(|o| o.request_timeout)
            .unwrap_or(self.request_timeout)
    }

    /// Breaker overrides keyed by service, for registry construction.
    pub(crate) fn breaker_overrides(&self) -> HashMap<String, BreakerConfig> {
        self.service_overrides
            .iter()
            .filter_map(|(service, overrides)| {
                overrides
                    .breaker
                    .clone()
                    .map(|breaker| (service.clone(), breaker))
            })
            .collect()
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Set the maximum number of attempts per call.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.retry.max_attempts = attempts.max(1);
        self
    }

    /// Set the delay before the first retry.
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.config.retry.base_delay = delay;
        self
    }

    /// Set the maximum backoff delay.
    pub fn max_delay(mut self, max: Duration) -> Self {
        self.config.retry.max_delay = max;
        self
    }

    /// Replace the whole retry policy.
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    /// Set the failure ratio that opens a circuit.
    pub fn failure_ratio(mut self, ratio: f64) -> Self {
        self.config.breaker.failure_ratio = ratio;
        self
    }

    /// Set the breaker's rolling window size.
    pub fn window_size(mut self, size: usize) -> Self {
        self.config.breaker.window_size = size.max(1);
        self
    }

    /// Set the minimum samples before the failure ratio is evaluated.
    pub fn min_samples(mut self, samples: usize) -> Self {
        self.config.breaker.min_samples = samples.max(1);
        self
    }

    /// Set the breaker cool-down duration.
    pub fn cool_down(mut self, cool_down: Duration) -> Self {
        self.config.breaker.cool_down = cool_down;
        self
    }

    /// Record fatal failures in breaker windows.
    pub fn count_fatal_failures(mut self, count: bool) -> Self {
        self.config.breaker.count_fatal_failures = count;
        self
    }

    /// Replace the whole default breaker policy.
    pub fn breaker(mut self, breaker: BreakerConfig) -> Self {
        self.config.breaker = breaker;
        self
    }

    /// Enable or disable the response cache.
    pub fn cache_enabled(mut self, enabled: bool) -> Self {
        self.config.cache.enabled = enabled;
        self
    }

    /// Set the default cache TTL.
    pub fn default_cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.cache.default_ttl = ttl;
        self
    }

    /// Replace the set of cache-eligible methods.
    pub fn cache_eligible_methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.config.cache.eligible_methods = methods.into_iter().collect();
        self
    }

    /// Serve still-live cached responses when a call ultimately fails.
    pub fn fallback_to_cache(mut self, fallback: bool) -> Self {
        self.config.cache.fallback_to_cache = fallback;
        self
    }

    /// Replace the whole cache policy.
    pub fn cache(mut self, cache: CacheConfig) -> Self {
        self.config.cache = cache;
        self
    }

    /// Replace the retryable status code set.
    pub fn retryable_status_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.config.retryable_status_codes = codes.into_iter().collect();
        self
    }

    /// Set the per-attempt transport timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Set the overall per-call deadline.
    pub fn call_deadline(mut self, deadline: Duration) -> Self {
        self.config.call_deadline = deadline;
        self
    }

    /// Add per-service overrides.
    pub fn service_override(
        mut self,
        service: impl Into<String>,
        overrides: ServiceOverrides,
    ) -> Self {
        self.config
            .service_overrides
            .insert(service.into(), overrides);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> ClientConfig {
        self.config
    }
}

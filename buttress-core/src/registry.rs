//! Lazily-initialized registry of per-service circuit breakers.

use crate::breaker::{BreakerConfig, CircuitBreaker};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Process-wide map of circuit breakers, keyed by service name.
///
/// Breakers are created on first use and never destroyed; every concurrent
/// call to a service shares the same instance. Lookup locking is
/// fine-grained (sharded by key), so unrelated services do not contend on a
/// common lock.
pub struct BreakerRegistry {
    default_config: BreakerConfig,
    overrides: HashMap<String, BreakerConfig>,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl BreakerRegistry {
    /// Create a registry with a default config and per-service overrides.
    pub fn new(default_config: BreakerConfig, overrides: HashMap<String, BreakerConfig>) -> Self {
        Self {
            default_config,
            overrides,
            breakers: DashMap::new(),
        }
    }

    /// Get or create the breaker for `service`.
    pub fn breaker_for(&self, service: &str, now: Instant) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.get(service) {
            return Arc::clone(&breaker);
        }
        let entry = self.breakers.entry(service.to_string()).or_insert_with(|| {
            let config = self
                .overrides
                .get(service)
                .cloned()
                .unwrap_or_else(|| self.default_config.clone());
            Arc::new(CircuitBreaker::new(service, config, now))
        });
        Arc::clone(&entry)
    }

    /// Look up an existing breaker without creating one.
    pub fn get(&self, service: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(service).map(|b| Arc::clone(&b))
    }

    /// Reset a service's breaker to closed. Returns false if the service has
    /// never been called.
    pub fn reset(&self, service: &str, now: Instant) -> bool {
        match self.get(service) {
            Some(breaker) => {
                breaker.reset(now);
                true
            }
            None => false,
        }
    }

    /// Number of breakers created so far.
    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    /// True if no breaker has been created yet.
    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}

impl std::fmt::Debug for BreakerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BreakerRegistry")
            .field("default_config", &self.default_config)
            .field("breakers", &self.breakers.len())
            .finish()
    }
}

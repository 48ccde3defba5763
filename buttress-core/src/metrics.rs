//! Call events and metrics sinks.

use crate::breaker::CircuitState;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Number of recent latencies kept for percentile calculation.
const LATENCY_RESERVOIR: usize = 1000;

/// What a [`CallEvent`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// An attempt completed with a success classification.
    Success,
    /// An attempt completed with a retryable failure.
    RetryableFailure,
    /// An attempt completed with a fatal failure.
    FatalFailure,
    /// The breaker rejected the call without a transport attempt.
    BreakerRejected,
    /// The call was answered from the cache.
    CacheHit,
    /// The cache was consulted and had no live entry.
    CacheMiss,
}

/// One observability event, emitted per attempt and per cache or breaker
/// decision.
#[derive(Debug, Clone)]
pub struct CallEvent {
    /// Target service.
    pub service: String,
    /// What happened.
    pub kind: EventKind,
    /// Attempt number within the call, starting at 1. Absent for cache
    /// events.
    pub attempt: Option<u32>,
    /// Attempt latency. Absent when no transport attempt was made.
    pub latency: Option<Duration>,
    /// Breaker phase observed after the event.
    pub breaker_state: Option<CircuitState>,
}

/// Fire-and-forget sink for call events.
///
/// `record` must not block and must not fail: implementations swallow their
/// own errors. Degraded observability never becomes a call failure.
pub trait MetricsSink: Send + Sync {
    /// Record one event.
    fn record(&self, event: &CallEvent);
}

/// Sink that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn record(&self, _event: &CallEvent) {}
}

/// In-memory aggregating sink with a queryable snapshot.
///
/// Keeps per-kind counters and a bounded reservoir of recent attempt
/// latencies for percentile estimation.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    successes: AtomicU64,
    retryable_failures: AtomicU64,
    fatal_failures: AtomicU64,
    breaker_rejections: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    retries: AtomicU64,
    latencies: Mutex<VecDeque<Duration>>,
}

impl MetricsCollector {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Produce a point-in-time aggregate view.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let successes = self.successes.load(Ordering::Relaxed);
        let retryable_failures = self.retryable_failures.load(Ordering::Relaxed);
        let fatal_failures = self.fatal_failures.load(Ordering::Relaxed);
        let attempts = successes + retryable_failures + fatal_failures;

        let cache_hits = self.cache_hits.load(Ordering::Relaxed);
        let cache_misses = self.cache_misses.load(Ordering::Relaxed);
        let cache_lookups = cache_hits + cache_misses;

        let mut sorted: Vec<Duration> = self.latencies.lock().iter().copied().collect();
        sorted.sort_unstable();

        MetricsSnapshot {
            attempts,
            successes,
            retryable_failures,
            fatal_failures,
            breaker_rejections: self.breaker_rejections.load(Ordering::Relaxed),
            cache_hits,
            cache_misses,
            retries: self.retries.load(Ordering::Relaxed),
            success_rate: if attempts > 0 {
                successes as f64 / attempts as f64
            } else {
                0.0
            },
            cache_hit_rate: if cache_lookups > 0 {
                cache_hits as f64 / cache_lookups as f64
            } else {
                0.0
            },
            latency_avg: average(&sorted),
            latency_p50: percentile(&sorted, 0.50),
            latency_p95: percentile(&sorted, 0.95),
            latency_p99: percentile(&sorted, 0.99),
        }
    }

    /// Reset all counters and the latency reservoir.
    pub fn reset(&self) {
        self.successes.store(0, Ordering::Relaxed);
        self.retryable_failures.store(0, Ordering::Relaxed);
        self.fatal_failures.store(0, Ordering::Relaxed);
        self.breaker_rejections.store(0, Ordering::Relaxed);
        self.cache_hits.store(0, Ordering::Relaxed);
        self.cache_misses.store(0, Ordering::Relaxed);
        self.retries.store(0, Ordering::Relaxed);
        self.latencies.lock().clear();
    }
}

impl MetricsSink for MetricsCollector {
    fn record(&self, event: &CallEvent) {
        match event.kind {
            EventKind::Success => self.successes.fetch_add(1, Ordering::Relaxed),
            EventKind::RetryableFailure => self.retryable_failures.fetch_add(1, Ordering::Relaxed),
            EventKind::FatalFailure => self.fatal_failures.fetch_add(1, Ordering::Relaxed),
            EventKind::BreakerRejected => self.breaker_rejections.fetch_add(1, Ordering::Relaxed),
            EventKind::CacheHit => self.cache_hits.fetch_add(1, Ordering::Relaxed),
            EventKind::CacheMiss => self.cache_misses.fetch_add(1, Ordering::Relaxed),
        };

        if event.attempt.is_some_and(|attempt| attempt > 1) {
            self.retries.fetch_add(1, Ordering::Relaxed);
        }

        if let Some(latency) = event.latency {
            let mut latencies = self.latencies.lock();
            if latencies.len() == LATENCY_RESERVOIR {
                latencies.pop_front();
            }
            latencies.push_back(latency);
        }
    }
}

/// Point-in-time aggregate of a [`MetricsCollector`].
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    /// Transport attempts observed.
    pub attempts: u64,
    /// Attempts classified as success.
    pub successes: u64,
    /// Attempts classified as retryable failures.
    pub retryable_failures: u64,
    /// Attempts classified as fatal failures.
    pub fatal_failures: u64,
    /// Calls rejected by an open breaker.
    pub breaker_rejections: u64,
    /// Calls answered from the cache.
    pub cache_hits: u64,
    /// Cache lookups that missed.
    pub cache_misses: u64,
    /// Attempts beyond the first within a call.
    pub retries: u64,
    /// Successes over attempts; zero when nothing was attempted.
    pub success_rate: f64,
    /// Hits over cache lookups; zero when the cache was never consulted.
    pub cache_hit_rate: f64,
    /// Mean attempt latency.
    pub latency_avg: Option<Duration>,
    /// Median attempt latency.
    pub latency_p50: Option<Duration>,
    /// 95th percentile attempt latency.
    pub latency_p95: Option<Duration>,
    /// 99th percentile attempt latency.
    pub latency_p99: Option<Duration>,
}

fn average(sorted: &[Duration]) -> Option<Duration> {
    if sorted.is_empty() {
        return None;
    }
    let total: Duration = sorted.iter().sum();
    Some(total / sorted.len() as u32)
}

fn percentile(sorted: &[Duration], p: f64) -> Option<Duration> {
    if sorted.is_empty() {
        return None;
    }
    let index = ((sorted.len() as f64 * p) as usize).min(sorted.len() - 1);
    Some(sorted[index])
}

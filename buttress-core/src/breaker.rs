//! Per-service circuit breaker.
//!
//! The breaker fails fast when a downstream service is unhealthy, shedding
//! load from the dependency and protecting the caller's latency budget. It
//! has three states:
//!
//! - **Closed**: calls pass through; outcomes accumulate in a rolling window
//! - **Open**: calls are rejected immediately until the cool-down elapses
//! - **HalfOpen**: a single probe call is allowed through to test recovery
//!
//! The circuit opens when the failure ratio over the last `window_size`
//! outcomes crosses `failure_ratio` (once at least `min_samples` outcomes
//! have been observed). Open → HalfOpen happens lazily on the next admission
//! after the cool-down, no timer task involved.

use crate::classify::Classification;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed, calls are allowed.
    Closed,
    /// Circuit is open, calls are rejected.
    Open,
    /// Circuit is half-open, a single probe is allowed.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Failure ratio over the rolling window that opens the circuit.
    pub failure_ratio: f64,
    /// Number of recent outcomes kept in the rolling window.
    pub window_size: usize,
    /// Minimum number of samples before the ratio is evaluated.
    pub min_samples: usize,
    /// Time spent rejecting calls before a probe is admitted.
    pub cool_down: Duration,
    /// Whether fatal (non-retryable) failures are recorded in the window.
    ///
    /// Off by default: a flood of 4xx reflects caller error, not service
    /// unavailability.
    pub count_fatal_failures: bool,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_ratio: 0.5,
            window_size: 10,
            min_samples: 5,
            cool_down: Duration::from_secs(30),
            count_fatal_failures: false,
        }
    }
}

impl BreakerConfig {
    /// Set the failure ratio that opens the circuit.
    pub fn failure_ratio(mut self, ratio: f64) -> Self {
        self.failure_ratio = ratio;
        self
    }

    /// Set the rolling window size.
    pub fn window_size(mut self, size: usize) -> Self {
        self.window_size = size.max(1);
        self
    }

    /// Set the minimum sample count before the ratio is evaluated.
    pub fn min_samples(mut self, samples: usize) -> Self {
        self.min_samples = samples.max(1);
        self
    }

    /// Set the cool-down duration.
    pub fn cool_down(mut self, cool_down: Duration) -> Self {
        self.cool_down = cool_down;
        self
    }

    /// Record fatal failures in the rolling window.
    pub fn count_fatal_failures(mut self, count: bool) -> Self {
        self.count_fatal_failures = count;
        self
    }
}

/// Outcome of asking the breaker whether a call may proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The call may execute normally.
    Allowed,
    /// The call may execute as the single half-open probe.
    AllowedProbe,
    /// The call must fail fast without a transport attempt. `retry_after` is
    /// the time until the next probe window, zero when a probe is already in
    /// flight.
    Rejected {
        /// Time until the next probe admission.
        retry_after: Duration,
    },
}

struct BreakerInner {
    state: CircuitState,
    /// Rolling window of recent outcomes, `true` meaning failure.
    window: VecDeque<bool>,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    last_transition: Instant,
    probe_in_flight: bool,
}

/// Circuit breaker for a single downstream service.
///
/// Exactly one instance exists per service for the lifetime of the owning
/// registry; every concurrent call to that service shares it. All state
/// lives behind one mutex per breaker, so breakers for unrelated services
/// never contend. The lock is only held for state inspection and updates,
/// never across transport I/O or backoff sleeps.
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Create a new closed breaker.
    pub fn new(name: impl Into<String>, config: BreakerConfig, now: Instant) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                window: VecDeque::new(),
                consecutive_failures: 0,
                opened_at: None,
                last_transition: now,
                probe_in_flight: false,
            }),
        }
    }

    /// The service this breaker guards.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ask whether a call may proceed.
    ///
    /// Lazily moves Open → HalfOpen once the cool-down has elapsed; the
    /// transitioning call claims the probe slot in the same critical section,
    /// so at most one probe is ever in flight.
    pub fn admit(&self, now: Instant) -> Admission {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => Admission::Allowed,
            CircuitState::Open => {
                let opened_at = inner.opened_at.unwrap_or(inner.last_transition);
                let reopen_at = opened_at + self.config.cool_down;
                if now >= reopen_at {
                    debug!(breaker = %self.name, "cool-down elapsed, transitioning to half-open");
                    inner.state = CircuitState::HalfOpen;
                    inner.last_transition = now;
                    inner.probe_in_flight = true;
                    Admission::AllowedProbe
                } else {
                    Admission::Rejected {
                        retry_after: reopen_at - now,
                    }
                }
            }
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    Admission::Rejected {
                        retry_after: Duration::ZERO,
                    }
                } else {
                    inner.probe_in_flight = true;
                    Admission::AllowedProbe
                }
            }
        }
    }

    /// Record a classified outcome.
    ///
    /// `probe` must be true iff the attempt was admitted with
    /// [`Admission::AllowedProbe`]; the probe slot is released regardless of
    /// the outcome. Fatal outcomes are ignored unless
    /// [`BreakerConfig::count_fatal_failures`] is set, so they cause no
    /// transition and no window sample.
    pub fn record(&self, classification: Classification, probe: bool, now: Instant) {
        let mut inner = self.inner.lock();
        if probe {
            inner.probe_in_flight = false;
        }

        let failed = match classification {
            Classification::Success => false,
            Classification::Retryable => true,
            Classification::Fatal => {
                if !self.config.count_fatal_failures {
                    return;
                }
                true
            }
        };

        match inner.state {
            CircuitState::HalfOpen if probe => {
                if failed {
                    self.open(&mut inner, now);
                } else {
                    self.close(&mut inner, now);
                }
            }
            CircuitState::Closed => {
                if failed {
                    inner.consecutive_failures += 1;
                } else {
                    inner.consecutive_failures = 0;
                }
                if inner.window.len() == self.config.window_size {
                    inner.window.pop_front();
                }
                inner.window.push_back(failed);

                if self.ratio_tripped(&inner) {
                    self.open(&mut inner, now);
                }
            }
            // An outcome for an attempt admitted before a concurrent
            // transition; the window no longer applies to it.
            _ => {}
        }
    }

    /// Current phase. Reports HalfOpen for an open breaker whose cool-down
    /// has already elapsed, without claiming the probe slot.
    pub fn state(&self, now: Instant) -> CircuitState {
        let inner = self.inner.lock();
        match inner.state {
            CircuitState::Open => {
                let opened_at = inner.opened_at.unwrap_or(inner.last_transition);
                if now >= opened_at + self.config.cool_down {
                    CircuitState::HalfOpen
                } else {
                    CircuitState::Open
                }
            }
            state => state,
        }
    }

    /// Time until the next probe admission; zero unless the circuit is open
    /// and still cooling down.
    pub fn retry_after(&self, now: Instant) -> Duration {
        let inner = self.inner.lock();
        match (inner.state, inner.opened_at) {
            (CircuitState::Open, Some(opened_at)) => {
                (opened_at + self.config.cool_down).saturating_duration_since(now)
            }
            _ => Duration::ZERO,
        }
    }

    /// Current consecutive-failure count.
    pub fn consecutive_failures(&self) -> u32 {
        self.inner.lock().consecutive_failures
    }

    /// Snapshot of the breaker for management and metrics surfaces.
    pub fn stats(&self, now: Instant) -> BreakerStats {
        let inner = self.inner.lock();
        let failures = inner.window.iter().filter(|failed| **failed).count();
        BreakerStats {
            name: self.name.clone(),
            state: match inner.state {
                CircuitState::Open => {
                    let opened_at = inner.opened_at.unwrap_or(inner.last_transition);
                    if now >= opened_at + self.config.cool_down {
                        CircuitState::HalfOpen
                    } else {
                        CircuitState::Open
                    }
                }
                state => state,
            },
            samples: inner.window.len(),
            failures_in_window: failures,
            consecutive_failures: inner.consecutive_failures,
        }
    }

    /// Force the breaker back to closed, clearing all accumulated state.
    pub fn reset(&self, now: Instant) {
        let mut inner = self.inner.lock();
        self.close(&mut inner, now);
    }

    fn ratio_tripped(&self, inner: &BreakerInner) -> bool {
        let samples = inner.window.len();
        if samples < self.config.min_samples.max(1) {
            return false;
        }
        let failures = inner.window.iter().filter(|failed| **failed).count();
        failures as f64 / samples as f64 >= self.config.failure_ratio
    }

    fn open(&self, inner: &mut BreakerInner, now: Instant) {
        if inner.state != CircuitState::Open {
            let failures = inner.window.iter().filter(|failed| **failed).count();
            warn!(
                breaker = %self.name,
                failures,
                samples = inner.window.len(),
                "circuit opened"
            );
        }
        inner.state = CircuitState::Open;
        inner.opened_at = Some(now);
        inner.last_transition = now;
        inner.probe_in_flight = false;
    }

    fn close(&self, inner: &mut BreakerInner, now: Instant) {
        if inner.state != CircuitState::Closed {
            info!(breaker = %self.name, "circuit closed");
        }
        inner.state = CircuitState::Closed;
        inner.window.clear();
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.last_transition = now;
        inner.probe_in_flight = false;
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish()
    }
}

/// Point-in-time view of a breaker.
#[derive(Debug, Clone)]
pub struct BreakerStats {
    /// Service the breaker guards.
    pub name: String,
    /// Current phase.
    pub state: CircuitState,
    /// Outcomes currently in the rolling window.
    pub samples: usize,
    /// Failures currently in the rolling window.
    pub failures_in_window: usize,
    /// Consecutive failures observed while closed.
    pub consecutive_failures: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(config: BreakerConfig, now: Instant) -> CircuitBreaker {
        CircuitBreaker::new("listings", config, now)
    }

    #[test]
    fn test_opens_once_ratio_crossed_at_min_samples() {
        let now = Instant::now();
        let cb = breaker(BreakerConfig::default(), now);

        // Four retryable failures: below the five-sample floor, still closed.
        for _ in 0..4 {
            cb.record(Classification::Retryable, false, now);
        }
        assert_eq!(cb.state(now), CircuitState::Closed);

        cb.record(Classification::Retryable, false, now);
        assert_eq!(cb.state(now), CircuitState::Open);
        assert!(matches!(cb.admit(now), Admission::Rejected { .. }));
    }

    #[test]
    fn test_mixed_window_respects_ratio() {
        let now = Instant::now();
        let cb = breaker(BreakerConfig::default(), now);

        // 1 failure in 5 samples: 20%, stays closed.
        cb.record(Classification::Retryable, false, now);
        for _ in 0..4 {
            cb.record(Classification::Success, false, now);
        }
        assert_eq!(cb.state(now), CircuitState::Closed);

        // 5 failures / 10 samples hits the 50% threshold exactly.
        for _ in 0..5 {
            cb.record(Classification::Retryable, false, now);
        }
        assert_eq!(cb.state(now), CircuitState::Open);
    }

    #[test]
    fn test_fatal_failures_do_not_trip_by_default() {
        let now = Instant::now();
        let cb = breaker(BreakerConfig::default(), now);

        for _ in 0..20 {
            cb.record(Classification::Fatal, false, now);
        }
        assert_eq!(cb.state(now), CircuitState::Closed);
        assert_eq!(cb.stats(now).samples, 0);
    }

    #[test]
    fn test_fatal_failures_trip_when_configured() {
        let now = Instant::now();
        let cb = breaker(BreakerConfig::default().count_fatal_failures(true), now);

        for _ in 0..5 {
            cb.record(Classification::Fatal, false, now);
        }
        assert_eq!(cb.state(now), CircuitState::Open);
    }

    #[test]
    fn test_rejects_during_cool_down_then_admits_probe() {
        let t0 = Instant::now();
        let cb = breaker(BreakerConfig::default(), t0);
        for _ in 0..5 {
            cb.record(Classification::Retryable, false, t0);
        }

        let rejected = cb.admit(t0 + Duration::from_secs(10));
        match rejected {
            Admission::Rejected { retry_after } => {
                assert_eq!(retry_after, Duration::from_secs(20));
            }
            other => panic!("expected rejection, got {other:?}"),
        }

        // Cool-down elapsed: exactly one probe is admitted.
        let t1 = t0 + Duration::from_secs(30);
        assert_eq!(cb.admit(t1), Admission::AllowedProbe);
        assert_eq!(
            cb.admit(t1),
            Admission::Rejected {
                retry_after: Duration::ZERO
            }
        );
    }

    #[test]
    fn test_probe_success_closes() {
        let t0 = Instant::now();
        let cb = breaker(BreakerConfig::default(), t0);
        for _ in 0..5 {
            cb.record(Classification::Retryable, false, t0);
        }

        let t1 = t0 + Duration::from_secs(30);
        assert_eq!(cb.admit(t1), Admission::AllowedProbe);
        cb.record(Classification::Success, true, t1);

        assert_eq!(cb.state(t1), CircuitState::Closed);
        assert_eq!(cb.stats(t1).samples, 0);
        assert_eq!(cb.admit(t1), Admission::Allowed);
    }

    #[test]
    fn test_probe_failure_reopens_and_restarts_cool_down() {
        let t0 = Instant::now();
        let cb = breaker(BreakerConfig::default(), t0);
        for _ in 0..5 {
            cb.record(Classification::Retryable, false, t0);
        }

        let t1 = t0 + Duration::from_secs(30);
        assert_eq!(cb.admit(t1), Admission::AllowedProbe);
        cb.record(Classification::Retryable, true, t1);

        assert_eq!(cb.state(t1), CircuitState::Open);
        // Cool-down restarted from the probe failure, not the original open.
        match cb.admit(t1 + Duration::from_secs(29)) {
            Admission::Rejected { retry_after } => {
                assert_eq!(retry_after, Duration::from_secs(1));
            }
            other => panic!("expected rejection, got {other:?}"),
        }
        assert_eq!(
            cb.admit(t1 + Duration::from_secs(30)),
            Admission::AllowedProbe
        );
    }

    #[test]
    fn test_probe_fatal_releases_slot_without_transition() {
        let t0 = Instant::now();
        let cb = breaker(BreakerConfig::default(), t0);
        for _ in 0..5 {
            cb.record(Classification::Retryable, false, t0);
        }

        let t1 = t0 + Duration::from_secs(30);
        assert_eq!(cb.admit(t1), Admission::AllowedProbe);
        cb.record(Classification::Fatal, true, t1);

        // Still half-open, and the next call may probe again.
        assert_eq!(cb.state(t1), CircuitState::HalfOpen);
        assert_eq!(cb.admit(t1), Admission::AllowedProbe);
    }

    #[test]
    fn test_success_resets_consecutive_failures() {
        let now = Instant::now();
        let cb = breaker(BreakerConfig::default(), now);

        cb.record(Classification::Retryable, false, now);
        cb.record(Classification::Retryable, false, now);
        assert_eq!(cb.consecutive_failures(), 2);

        cb.record(Classification::Success, false, now);
        assert_eq!(cb.consecutive_failures(), 0);
    }

    #[test]
    fn test_window_is_bounded() {
        let now = Instant::now();
        let config = BreakerConfig::default()
            .window_size(4)
            .min_samples(4)
            .failure_ratio(0.75);
        let cb = breaker(config, now);

        // Old failures roll out of the window as successes arrive.
        for _ in 0..3 {
            cb.record(Classification::Retryable, false, now);
        }
        for _ in 0..4 {
            cb.record(Classification::Success, false, now);
        }
        assert_eq!(cb.stats(now).samples, 4);
        assert_eq!(cb.stats(now).failures_in_window, 0);
        assert_eq!(cb.state(now), CircuitState::Closed);
    }

    #[test]
    fn test_reset_restores_closed() {
        let now = Instant::now();
        let cb = breaker(BreakerConfig::default(), now);
        for _ in 0..5 {
            cb.record(Classification::Retryable, false, now);
        }
        assert_eq!(cb.state(now), CircuitState::Open);

        cb.reset(now);
        assert_eq!(cb.state(now), CircuitState::Closed);
        assert_eq!(cb.admit(now), Admission::Allowed);
    }
}

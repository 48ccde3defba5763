//! Time source abstraction.

use async_trait::async_trait;
use std::time::{Duration, Instant};

/// Monotonic time and sleep primitives, injected so tests can run against
/// virtual time.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Current monotonic instant.
    fn now(&self) -> Instant;

    /// Suspend the calling task for `duration` without blocking the runtime.
    async fn sleep(&self, duration: Duration);
}

/// Clock backed by the tokio runtime.
///
/// Under `tokio::time::pause` (or `#[tokio::test(start_paused = true)]`)
/// both `now` and `sleep` follow tokio's virtual time, so timing-sensitive
/// tests run instantly and deterministically.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

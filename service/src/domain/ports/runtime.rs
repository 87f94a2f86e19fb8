//! Runtime abstractions used by the fetcher's retry policy.
//!
//! Sleeping and jitter are injected so tests can drive the retry loop
//! deterministically without waiting on wall-clock time.

use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Upper bound (exclusive) of the uniform jitter added to each backoff.
const JITTER_CAP_MS: u64 = 500;

/// Async clock-independent sleeping abstraction for retries.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Suspend execution for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Retry backoff jitter abstraction.
pub trait RetryJitter: Send + Sync {
    /// Return a jittered delay from the exponential base delay.
    fn jittered(&self, base: Duration, attempt: u32) -> Duration;
}

/// Tokio-based sleeper implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Uniform jitter in `[0, 500ms)` on top of the base delay.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformJitter;

impl RetryJitter for UniformJitter {
    fn jittered(&self, base: Duration, _attempt: u32) -> Duration {
        let extra = SmallRng::from_entropy().gen_range(0..JITTER_CAP_MS);
        base.saturating_add(Duration::from_millis(extra))
    }
}

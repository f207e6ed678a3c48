//! Bounded retry with exponential backoff and jitter.
//!
//! Every call to an external collaborator (fetch, upload, push) goes
//! through a [`RetryPolicy`]. The delay before attempt `n + 1` is
//!
//! ```text
//! delay = min(base_delay * 2^(n-1), max_delay) + random_jitter(0..=jitter)
//! ```

use rand::{Rng, rng};
use serde::Deserialize;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, instrument, warn};

use crate::error::Result;

/// Retry settings. Three attempts with a one second base delay unless
/// configured otherwise.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: usize,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            jitter_ms: 250,
        }
    }
}

impl RetryPolicy {
    /// Backoff before the attempt following failed attempt number `attempt`
    /// (1-based), without jitter.
    pub fn backoff(&self, attempt: usize) -> Duration {
        let shift = attempt.saturating_sub(1).min(16) as u32;
        let delay = Duration::from_millis(self.base_delay_ms).saturating_mul(1 << shift);
        delay.min(Duration::from_millis(self.max_delay_ms))
    }

    fn jitter(&self) -> Duration {
        if self.jitter_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rng().random_range(0..=self.jitter_ms))
    }

    /// Run `op` until it succeeds, the attempts are exhausted, or it returns
    /// an error that retrying cannot fix.
    #[instrument(level = "debug", skip(self, op))]
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let total_t0 = Instant::now();
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0usize;

        loop {
            attempt += 1;
            let attempt_t0 = Instant::now();
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    let elapsed_ms_attempt = attempt_t0.elapsed().as_millis();
                    let elapsed_ms_total = total_t0.elapsed().as_millis();

                    if attempt >= max_attempts || !e.is_transient() {
                        error!(
                            label,
                            attempt,
                            max = max_attempts,
                            elapsed_ms_attempt,
                            elapsed_ms_total,
                            error = %e,
                            "Giving up"
                        );
                        return Err(e);
                    }

                    let delay = self.backoff(attempt) + self.jitter();
                    warn!(
                        label,
                        attempt,
                        max = max_attempts,
                        elapsed_ms_attempt,
                        ?delay,
                        error = %e,
                        "Attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

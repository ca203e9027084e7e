// Bounded retry with exponential backoff and jitter
// One policy instance per loader; no shared mutable state across tracks

use rand::Rng;
use std::time::Duration;

/// Backoff policy for transient fetch/decode failures.
///
/// Delays grow as `base * factor^(attempt-1)`, capped at `max_delay`,
/// then jittered so that many tracks loading at once do not retry in
/// lockstep.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first (not "retries after")
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub factor: f64,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            factor: 2.0,
            max_delay: Duration::from_millis(5000),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after `attempt` (1-based) has failed.
    ///
    /// Equal jitter: half the capped exponential delay is fixed, the
    /// other half is uniformly random.
    pub fn backoff_delay(&self, attempt: u32, rng: &mut impl Rng) -> Duration {
        let exp = self.base_delay.as_secs_f64() * self.factor.powi(attempt as i32 - 1);
        let capped = exp.min(self.max_delay.as_secs_f64());
        let jittered = capped / 2.0 + rng.gen_range(0.0..=capped / 2.0);
        Duration::from_secs_f64(jittered)
    }
}

/// Run `op` under the policy.
///
/// `op` receives the 1-based attempt number. After a failed attempt that
/// still has retries left, `on_retry` is invoked with the number of the
/// attempt about to run (so a track can surface `Retrying(n)`), then
/// `sleep` is called with the jittered delay. The last error is returned
/// once attempts are exhausted. `sleep` is injected so tests and
/// non-blocking hosts control time.
pub fn with_retry<T, E>(
    policy: &RetryPolicy,
    rng: &mut impl Rng,
    mut sleep: impl FnMut(Duration),
    mut on_retry: impl FnMut(u32),
    mut op: impl FnMut(u32) -> Result<T, E>,
) -> Result<T, E> {
    let mut attempt = 1;
    loop {
        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= policy.max_attempts {
                    return Err(err);
                }
                let delay = policy.backoff_delay(attempt, rng);
                attempt += 1;
                on_retry(attempt);
                sleep(delay);
            }
        }
    }
}

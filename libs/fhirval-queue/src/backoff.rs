//! Retry/backoff policy shared by the dispatcher (§4.9).

use std::time::Duration;

use rand::Rng;

#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter_ratio: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self { base_delay: Duration::from_millis(500), max_delay: Duration::from_secs(30), jitter_ratio: 0.2 }
    }
}

impl BackoffPolicy {
    /// Delay before attempt number `attempt` (1-indexed), exponential with a cap,
    /// jittered the same way the server's reconnect loop does.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1).min(16));
        let scaled = self.base_delay.saturating_mul(factor).min(self.max_delay);
        jittered_duration(scaled, self.jitter_ratio)
    }
}

fn jittered_duration(base: Duration, jitter_ratio: f64) -> Duration {
    if base.is_zero() || jitter_ratio <= 0.0 {
        return base;
    }
    let signed = rand::thread_rng().gen_range(-1.0..=1.0);
    let factor = (1.0 + signed * jitter_ratio).max(0.0);
    base.mul_f64(factor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_then_caps() {
        let policy = BackoffPolicy { base_delay: Duration::from_millis(100), max_delay: Duration::from_secs(1), jitter_ratio: 0.0 };
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(10), Duration::from_secs(1));
    }
}

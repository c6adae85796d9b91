use std::time::Duration;

/// Default delay between polls of a processing analysis.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(3000);

/// Upper bound on the delay when backoff is enabled.
pub const DEFAULT_MAX_INTERVAL: Duration = Duration::from_secs(30);

/// How often, and for how long, a processing analysis is re-fetched.
///
/// The defaults reproduce the dashboard's behavior: a fixed 3 second delay
/// and no attempt limit. `max_attempts` and `backoff_factor` let a
/// deployment bound polling of an analysis that never leaves `processing`.
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// Total fetches allowed before giving up (None = unbounded).
    pub max_attempts: Option<u32>,
    /// Multiplier applied to the delay after each processing response.
    pub backoff_factor: f64,
    pub max_interval: Duration,
    /// Random extra delay in `[0, jitter]` added to each wait.
    pub jitter: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: None,
            backoff_factor: 1.0,
            max_interval: DEFAULT_MAX_INTERVAL,
            jitter: Duration::ZERO,
        }
    }
}

impl PollPolicy {
    pub fn fixed(interval: Duration) -> Self {
        Self {
            interval,
            ..Default::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts.filter(|n| *n > 0);
        self
    }

    pub fn with_backoff(mut self, factor: f64, max_interval: Duration) -> Self {
        self.backoff_factor = if factor.is_finite() && factor >= 1.0 { factor } else { 1.0 };
        self.max_interval = max_interval;
        self
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Deterministic part of the wait after the `attempt`-th fetch (1-based).
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(64) as i32;
        let scaled = self.interval.as_secs_f64() * self.backoff_factor.powi(exponent);
        let cap = self.max_interval.max(self.interval).as_secs_f64();
        Duration::from_secs_f64(scaled.min(cap))
    }

    /// Wait before the next fetch, including jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        if self.jitter.is_zero() {
            return base;
        }
        let extra_ms = rand::random_range(0..=self.jitter.as_millis() as u64);
        base + Duration::from_millis(extra_ms)
    }

    /// True once `attempts` fetches have used up the budget.
    pub fn attempts_exhausted(&self, attempts: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempts >= max)
    }
}

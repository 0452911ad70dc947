use std::time::Duration;

/// Exponential reconnect schedule: `delay(n) = min(base * 2^n, cap)`.
///
/// `n` counts consecutive failures since the last successful open and starts
/// at zero. No jitter is applied, so a given failure count always maps to the
/// same delay.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub base: Duration,
    /// Upper bound on any single delay (`None` = unbounded).
    pub cap: Option<Duration>,
    /// Consecutive automatic retries allowed before an error becomes terminal
    /// (`None` = unlimited).
    pub max_retries: Option<u32>,
}

impl RetryPolicy {
    /// Create an uncapped, unlimited policy with the given base interval.
    #[must_use]
    pub fn new(base: Duration) -> Self {
        Self {
            base,
            cap: None,
            max_retries: None,
        }
    }

    /// Set the maximum delay.
    #[must_use]
    pub fn cap(mut self, cap: Duration) -> Self {
        self.cap = Some(cap);
        self
    }

    /// Set the maximum number of consecutive retries.
    #[must_use]
    pub fn max_retries(mut self, max: u32) -> Self {
        self.max_retries = Some(max);
        self
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.base.is_zero() {
            return Err("Retry interval must be > 0".to_string());
        }
        if let Some(cap) = self.cap
            && cap < self.base
        {
            return Err("Max retry interval must be >= retry interval".to_string());
        }
        Ok(())
    }

    /// Whether another retry is allowed after `retry_count` consecutive ones.
    pub fn allows(&self, retry_count: u32) -> bool {
        self.max_retries.is_none_or(|max| retry_count < max)
    }

    /// Delay to wait before the retry following `retry_count` failures.
    ///
    /// Saturates instead of overflowing; with no cap the largest representable
    /// delay is [`Duration::MAX`].
    pub fn delay(&self, retry_count: u32) -> Duration {
        let uncapped = 2u32
            .checked_pow(retry_count)
            .and_then(|factor| self.base.checked_mul(factor))
            .unwrap_or(Duration::MAX);

        match self.cap {
            Some(cap) => uncapped.min(cap),
            None => uncapped,
        }
    }
}

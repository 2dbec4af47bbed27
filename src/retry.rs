//! Bounded retry with backoff for upstream quote lookups.
//!
//! The default budget is zero, so a lookup makes a single attempt; operators
//! opt into retries through `QUOTE_MAX_RETRIES`.

use std::time::Duration;

/// Delay strategy between attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Same delay before every retry.
    Fixed { delay: Duration },
    /// `base * 2^attempt`, capped at `max`, with +/- 50% jitter.
    Exponential { base: Duration, max: Duration },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_millis(200),
            max: Duration::from_secs(3),
        }
    }
}

impl Backoff {
    /// Delay before retry number `attempt` (0-based).
    pub fn delay(self, attempt: u32) -> Duration {
        match self {
            Self::Fixed { delay } => delay,
            Self::Exponential { base, max } => {
                let doubled = base.saturating_mul(2u32.saturating_pow(attempt));
                let capped = doubled.min(max).as_millis() as u64;
                let half = capped / 2;
                Duration::from_millis(capped - half + fastrand::u64(0..=half * 2))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub backoff: Backoff,
    /// Statuses worth another attempt; anything else fails straight away.
    pub retry_on_status: Vec<u16>,
}

impl RetryConfig {
    /// Exponential backoff on 408, 429 and 5xx gateway errors.
    pub fn from_budget(max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: Backoff::default(),
            retry_on_status: vec![408, 429, 500, 502, 503, 504],
        }
    }

    pub fn fixed(delay: Duration, max_retries: u32) -> Self {
        Self {
            backoff: Backoff::Fixed { delay },
            ..Self::from_budget(max_retries)
        }
    }

    pub fn attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    pub fn should_retry_status(&self, status: u16) -> bool {
        self.retry_on_status.contains(&status)
    }
}

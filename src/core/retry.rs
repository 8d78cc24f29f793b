//! Retry policy for collaborator calls (the note generator).

use std::time::Duration;

use crate::config::LlmSettings;

/// Retry policy for a fallible call
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including first try)
    pub max_attempts: u32,

    /// Initial delay between retries in milliseconds
    pub initial_delay_ms: u64,

    /// Maximum delay between retries in milliseconds
    pub max_delay_ms: u64,

    /// Backoff multiplier (delay *= multiplier after each retry)
    pub backoff_multiplier: f64,
}

const DEFAULT_MAX_DELAY_MS: u64 = 60_000;

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 5_000,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            backoff_multiplier: 1.0,
        }
    }
}

impl RetryPolicy {
    /// Fixed delay between attempts, as the LLM settings describe it
    pub fn from_settings(settings: &LlmSettings) -> Self {
        let delay_ms = settings.retry_delay_seconds.saturating_mul(1000);
        Self {
            max_attempts: settings.retry_count.max(1),
            initial_delay_ms: delay_ms,
            max_delay_ms: delay_ms.max(DEFAULT_MAX_DELAY_MS),
            backoff_multiplier: 1.0,
        }
    }

    /// Calculate delay for a specific attempt (1-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::from_millis(self.initial_delay_ms);
        }

        let delay = self.initial_delay_ms as f64
            * self.backoff_multiplier.powi((attempt - 1) as i32);

        let capped = delay.min(self.max_delay_ms as f64) as u64;
        Duration::from_millis(capped)
    }

    /// Check if we should retry based on attempt count
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

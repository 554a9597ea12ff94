use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Backoff strategy between retry attempts (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
    Fixed,
    Exponential,
}

/// Retry behavior attached to an `HttpAction` (spec §3, §4.4, §4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    #[serde(default)]
    pub on_status: HashSet<u16>,
    #[serde(default)]
    pub on_timeout: bool,
    #[serde(default)]
    pub on_connection_error: bool,
    #[serde(default = "default_backoff")]
    pub backoff: Backoff,
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    #[serde(default = "default_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_backoff() -> Backoff {
    Backoff::Fixed
}

fn default_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

impl RetryConfig {
    /// Delay before the next attempt, per the strategy in spec §4.4:
    /// fixed is constant, exponential is `min(base_delay * 2^(attempt-1), max_delay)`.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> u64 {
        match self.backoff {
            Backoff::Fixed => self.delay_ms,
            Backoff::Exponential => {
                let scaled = self.base_delay_ms.saturating_mul(1u64 << attempt.saturating_sub(1));
                scaled.min(self.max_delay_ms)
            }
        }
    }
}

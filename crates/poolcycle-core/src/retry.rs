use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 30;
pub const DEFAULT_RESTART_PAUSE_SECS: u64 = 120;

/// Fixed-count, fixed-delay retry policy.
///
/// `max_attempts` counts every attempt including the first, so `10` means at
/// most ten controller calls and nine delays per target per action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryPolicy {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    /// Pause between the stop phase and the start phase of a restart.
    #[serde(default = "default_restart_pause_secs")]
    pub restart_pause_secs: u64,
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_retry_delay_secs() -> u64 {
    DEFAULT_RETRY_DELAY_SECS
}

fn default_restart_pause_secs() -> u64 {
    DEFAULT_RESTART_PAUSE_SECS
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay_secs: default_retry_delay_secs(),
            restart_pause_secs: default_restart_pause_secs(),
        }
    }
}

impl RetryPolicy {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn restart_pause(&self) -> Duration {
        Duration::from_secs(self.restart_pause_secs)
    }

    /// Whether another attempt is allowed after `attempts` have failed.
    pub fn should_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }
}

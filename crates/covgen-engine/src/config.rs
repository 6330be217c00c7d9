//! Run configuration.

use std::time::Duration;

/// Configuration for one generation run.
///
/// All knobs live here instead of process-wide constants so a session is
/// fully described by the value it was constructed with.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Maximum generation attempts per target cycle (initial + repairs).
    pub max_attempts_per_target: u32,
    /// Maximum attempt cycles running concurrently, each on a distinct
    /// target.
    pub concurrency: usize,
    /// Optional wall-clock budget; when exceeded no further targets are
    /// attempted, in-flight cycles finish and are folded in.
    pub wall_clock_budget: Option<Duration>,
    /// Accepted cycles in a row that add no new coverage before a target
    /// is declared exhausted.
    pub max_stalls: u32,
    /// Generator invocations allowed per attempt before a transient
    /// failure escalates to exhaustion.
    pub transient_retry_budget: u32,
    /// Base of the exponential backoff between transient retries.
    pub transient_backoff_base: Duration,
    /// Exponential backoff factor.
    pub transient_backoff_factor: u32,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            // One initial attempt plus three repairs.
            max_attempts_per_target: 4,
            concurrency: 1,
            wall_clock_budget: None,
            max_stalls: 2,
            transient_retry_budget: 6,
            transient_backoff_base: Duration::from_secs(60),
            transient_backoff_factor: 6,
        }
    }
}

impl RunConfig {
    /// Quick config for fast iteration.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            max_attempts_per_target: 2,
            transient_retry_budget: 2,
            transient_backoff_base: Duration::from_secs(5),
            ..Default::default()
        }
    }

    /// Thorough config for long unattended sessions.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            max_attempts_per_target: 8,
            concurrency: 4,
            max_stalls: 4,
            ..Default::default()
        }
    }

    /// Backoff before transient retry number `retry` (0-based).
    #[must_use]
    pub fn transient_backoff(&self, retry: u32) -> Duration {
        let factor = u64::from(self.transient_backoff_factor).saturating_pow(retry);
        let factor = u32::try_from(factor).unwrap_or(u32::MAX);
        self.transient_backoff_base.saturating_mul(factor)
    }

    /// Reject configurations the loop cannot make progress under.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts_per_target == 0 {
            return Err(ConfigError::ZeroAttemptBudget);
        }
        if self.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.max_stalls == 0 {
            return Err(ConfigError::ZeroStallBudget);
        }
        if self.transient_retry_budget == 0 {
            return Err(ConfigError::ZeroTransientBudget);
        }
        if self.wall_clock_budget == Some(Duration::ZERO) {
            return Err(ConfigError::ZeroWallClockBudget);
        }
        Ok(())
    }
}

/// Configuration errors, raised before the loop starts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("max attempts per target must be at least 1")]
    ZeroAttemptBudget,

    #[error("concurrency must be at least 1")]
    ZeroConcurrency,

    #[error("max stalls must be at least 1")]
    ZeroStallBudget,

    #[error("transient retry budget must be at least 1")]
    ZeroTransientBudget,

    #[error("wall clock budget must be non-zero when set")]
    ZeroWallClockBudget,
}

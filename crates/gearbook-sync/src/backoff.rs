// SPDX-FileCopyrightText: 2026 Gearbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retry schedule for failed sync tasks.

use std::time::Duration;

/// Exponential backoff parameters, built from the `sync` config section.
///
/// Defaults match the config defaults; `backoff_factor` is validated to be
/// at least 1.0 before a policy is built from user config.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Multiplier applied per additional attempt.
    pub backoff_factor: f64,
    /// Ceiling on any single delay.
    pub max_delay: Duration,
    /// Failures after which a task is dead-lettered instead of retried.
    pub max_retries: i64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(2),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(60),
            max_retries: 5,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based).
    ///
    /// `delay(1)` is `initial_delay`; each further attempt multiplies by
    /// `backoff_factor`, clamped to `max_delay`.
    pub fn delay(&self, attempt: i64) -> Duration {
        let exponent = (attempt.max(1) - 1).min(i64::from(i32::MAX)) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.backoff_factor.powi(exponent);
        Duration::from_secs_f64(secs.min(self.max_delay.as_secs_f64()))
    }

    /// True when the attempt made after `retry_count` recorded failures was
    /// the last one in the budget. `max_retries` caps total attempts; the
    /// worker checks this before recording the failure it just observed.
    pub fn exhausted(&self, retry_count: i64) -> bool {
        retry_count + 1 >= self.max_retries
    }
}

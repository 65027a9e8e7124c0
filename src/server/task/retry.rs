//! Turns task failures into scheduling decisions.

use rand::Rng;
use std::time::Duration;

use super::{TaskEnvelope, TaskError};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Executions allowed per task, counting only non-rate-limit failures.
    pub max_attempts: u32,
    /// Rate-limit waits that do not spend the attempt budget.
    pub free_rate_limit_waits: u32,
    pub max_countdown: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            free_rate_limit_waits: 3,
            max_countdown: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    /// Re-enqueue after `countdown`; `counted` spends one attempt.
    Retry { countdown: Duration, counted: bool },
    /// Retryable, but the attempt budget is spent.
    GiveUp,
    /// Retrying cannot help.
    Fail,
}

impl RetryPolicy {
    /// Decides what happens to a task whose execution just failed.
    ///
    /// Rate limits and discovery waits are free for the first `free_rate_limit_waits`
    /// occurrences and counted afterwards. Other retryable failures always count. The
    /// countdown is the backoff for the task's retry number, raised to any `retry_after`
    /// the remote service asked for, never below one second and never above
    /// `max_countdown`.
    ///
    /// # Arguments
    /// - `envelope` - The failed task with its counters before this failure
    /// - `error` - Why the execution failed
    /// - `rng` - Jitter source
    ///
    /// # Returns
    /// - `Decision` - Retry with countdown, give up, or fail outright
    pub fn decide<R: Rng>(
        &self,
        envelope: &TaskEnvelope,
        error: &TaskError,
        rng: &mut R,
    ) -> Decision {
        if !error.is_retryable() {
            return Decision::Fail;
        }
        let (rate_limit, retry_after) = match error {
            TaskError::Gateway { kind, .. } => (kind.is_rate_limit(), kind.retry_after()),
            TaskError::App(_) => (false, None),
        };

        let counted = !(rate_limit && envelope.rate_limit_waits < self.free_rate_limit_waits);
        if counted && envelope.attempts + 1 >= self.max_attempts {
            return Decision::GiveUp;
        }

        let retry = envelope.attempts + envelope.rate_limit_waits + 1;
        let countdown = backoff(retry, rng)
            .max(retry_after.unwrap_or_default())
            .max(Duration::from_secs(1))
            .min(self.max_countdown);

        Decision::Retry { countdown, counted }
    }
}

/// Delay before retry number `attempt`.
///
/// The first retry waits one to three seconds. Later retries wait
/// `1 + uniform(0, n)^n` seconds, which grows fast enough that a handful of retries spans
/// from about a second to minutes.
pub fn backoff<R: Rng>(attempt: u32, rng: &mut R) -> Duration {
    if attempt <= 1 {
        return Duration::from_secs_f64(rng.random_range(1.0..=3.0));
    }

    let n = f64::from(attempt.min(16));
    let seconds = 1.0 + rng.random_range(0.0..n).powf(n);

    Duration::from_secs_f64(seconds.min(u32::MAX as f64))
}

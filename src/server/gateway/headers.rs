use std::collections::HashMap;
use std::time::Duration;

pub const BUCKET: &str = "x-ratelimit-bucket";
pub const LIMIT: &str = "x-ratelimit-limit";
pub const REMAINING: &str = "x-ratelimit-remaining";
pub const RESET: &str = "x-ratelimit-reset";
pub const RESET_AFTER: &str = "x-ratelimit-reset-after";
pub const GLOBAL: &str = "x-ratelimit-global";
pub const RETRY_AFTER: &str = "retry-after";

/// Longest wait or window accepted from a remote service; larger values are clamped.
pub const MAX_REMOTE_WAIT: Duration = Duration::from_secs(86_400);

/// Converts remote-reported seconds into a duration, capped at [`MAX_REMOTE_WAIT`].
///
/// Negative, NaN and infinite values are rejected.
pub fn remote_seconds(secs: f64) -> Option<Duration> {
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(secs.min(MAX_REMOTE_WAIT.as_secs_f64())).ok()
}

/// Rate-limit state reported by the remote service on a response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateLimitHeaders {
    pub bucket: Option<String>,
    pub limit: Option<i64>,
    pub remaining: Option<i64>,
    /// Unix time in seconds, fractional.
    pub reset: Option<f64>,
    /// Seconds until the window resets, fractional.
    pub reset_after: Option<f64>,
    pub global: bool,
    pub retry_after: Option<f64>,
}

impl RateLimitHeaders {
    /// Parses headers from a map with lowercase names. Malformed values are ignored.
    pub fn parse(headers: &HashMap<String, String>) -> Self {
        let number = |name: &str| headers.get(name).and_then(|v| v.trim().parse::<f64>().ok());

        Self {
            bucket: headers
                .get(BUCKET)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            limit: headers.get(LIMIT).and_then(|v| v.trim().parse().ok()),
            remaining: headers.get(REMAINING).and_then(|v| v.trim().parse().ok()),
            reset: number(RESET),
            reset_after: number(RESET_AFTER),
            global: headers
                .get(GLOBAL)
                .is_some_and(|v| v.trim().eq_ignore_ascii_case("true")),
            retry_after: number(RETRY_AFTER),
        }
    }

    /// Absolute reset time in unix milliseconds.
    ///
    /// `Reset-After` is preferred because it does not depend on clock agreement with the
    /// remote service. Both forms are capped at [`MAX_REMOTE_WAIT`] from `now_ms`.
    pub fn reset_at_ms(&self, now_ms: i64) -> Option<i64> {
        let latest = now_ms.saturating_add(MAX_REMOTE_WAIT.as_millis() as i64);

        if let Some(after) = self.reset_after.and_then(remote_seconds) {
            let after_ms = (after.as_secs_f64() * 1000.0).ceil() as i64;
            return Some(now_ms.saturating_add(after_ms).min(latest));
        }
        self.reset
            .filter(|reset| reset.is_finite())
            // `as` saturates, so an absurd reset lands on the cap
            .map(|reset| ((reset * 1000.0).ceil() as i64).min(latest))
    }

    /// How long the remote service asks callers to wait.
    pub fn wait(&self) -> Option<Duration> {
        self.retry_after.or(self.reset_after).and_then(remote_seconds)
    }
}

use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use super::route::Method;

/// Decoded response body; `None` for 204 and empty bodies.
pub type Payload = Option<Value>;

/// Result of one gateway call.
pub type Outcome = Result<Payload, ErrorKind>;

/// Where a rate-limit denial came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitScope {
    /// The local bucket cache refused the call; nothing was sent.
    Local,
    /// The remote service answered 429 (or its in-body equivalent).
    Remote,
    /// A remote-imposed global block is active.
    Global,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkErrorKind {
    Timeout,
    Connection,
    /// Non-2xx status without a recognizable error body.
    Status(u16),
}

/// Every way a gateway call can fail.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ErrorKind {
    #[error("rate limited ({scope:?}), retry after {retry_after:?}")]
    RateLimited {
        scope: RateLimitScope,
        retry_after: Option<Duration>,
    },

    /// Another worker is discovering the bucket for this route.
    #[error("bucket discovery in progress")]
    DiscoveryInProgress,

    #[error("network error: {0:?}")]
    Network(NetworkErrorKind),

    /// The remote service rejected the call with a domain error code.
    #[error("remote error {code}: {message}")]
    Remote { code: i64, message: String },

    #[error("missing credential")]
    MissingCredential,

    /// A success response whose body is not JSON.
    #[error("undecodable response body: {0}")]
    Decode(String),

    /// The shared store was unreachable, so rate limits could not be checked.
    #[error("store error: {0}")]
    Store(String),
}

impl ErrorKind {
    /// Whether a later attempt of the same call may succeed.
    ///
    /// Rate limits and discovery are always retryable. Timeouts and 5xx responses are
    /// retryable only for idempotent methods, since the first request may have been
    /// applied; a connection failure means nothing was sent.
    pub fn is_retryable(&self, method: Method) -> bool {
        match self {
            ErrorKind::RateLimited { .. } | ErrorKind::DiscoveryInProgress => true,
            ErrorKind::Network(NetworkErrorKind::Connection) => true,
            ErrorKind::Network(NetworkErrorKind::Timeout) => method.is_idempotent(),
            ErrorKind::Network(NetworkErrorKind::Status(status)) => {
                *status >= 500 && method.is_idempotent()
            }
            ErrorKind::Store(_) => true,
            ErrorKind::Remote { .. } | ErrorKind::MissingCredential | ErrorKind::Decode(_) => {
                false
            }
        }
    }

    /// Rate limits and discovery waits are expected; they do not spend the failure budget
    /// until the free waits run out.
    pub fn is_rate_limit(&self) -> bool {
        matches!(
            self,
            ErrorKind::RateLimited { .. } | ErrorKind::DiscoveryInProgress
        )
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ErrorKind::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    pub fn remote_code(&self) -> Option<i64> {
        match self {
            ErrorKind::Remote { code, .. } => Some(*code),
            _ => None,
        }
    }
}

//! Outbound API gateway.
//!
//! Every call to the chat platform or the game API funnels through [`client::Gateway`],
//! which consults the [`bucket::BucketRegistry`] before sending, writes the remote
//! rate-limit state back afterwards, and classifies the result into the closed
//! [`outcome::ErrorKind`] set so callers can decide whether to retry.

pub mod bucket;
pub mod client;
pub mod headers;
pub mod outcome;
pub mod route;
pub mod transport;

pub use client::{Credential, Gateway};
pub use outcome::{ErrorKind, NetworkErrorKind, Outcome, RateLimitScope};
pub use route::{Method, RouteKey, Service};

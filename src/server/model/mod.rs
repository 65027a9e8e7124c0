//! Domain models.
//!
//! Domain models are converted from entity models at the repository boundary, or from
//! remote payloads where the gateway hands them over, so the service and verification
//! layers never touch raw entity rows or untyped JSON.

pub mod member;
pub mod profile;
pub mod server;

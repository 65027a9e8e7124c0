//! Service layer between the task workers and the data layer.
//!
//! Services own the follow-up work that gateway failures and profile lookups require,
//! keeping the worker loop and the verification engine free of repository plumbing.

pub mod profile;
pub mod remote_error;

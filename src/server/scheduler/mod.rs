//! Cron jobs feeding the task queue.
//!
//! Jobs never do remote work themselves. They push a task and let the workers pick it
//! up, so every scheduled run goes through the same retry and rate-limit path as the
//! rest of the system.

pub mod verification;

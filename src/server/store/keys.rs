//! Key layout of the shared store.

use crate::server::gateway::route::RouteKey;

const PREFIX: &str = "tornsync";

/// Name of the sorted set holding queued task envelopes.
pub const TASK_QUEUE: &str = "tornsync:tasks";

/// Bucket id the remote service assigned to a route.
pub fn route_bucket(route: &RouteKey) -> String {
    format!("{PREFIX}:route:{}", route.as_str())
}

pub fn discovery_lock(route: &RouteKey) -> String {
    format!("{PREFIX}:route:{}:lock", route.as_str())
}

pub fn bucket_remaining(bucket_id: &str) -> String {
    format!("{PREFIX}:bucket:{bucket_id}:remaining")
}

pub fn bucket_limit(bucket_id: &str) -> String {
    format!("{PREFIX}:bucket:{bucket_id}:limit")
}

pub fn bucket_window(bucket_id: &str) -> String {
    format!("{PREFIX}:bucket:{bucket_id}:window")
}

pub fn bucket_reset(bucket_id: &str) -> String {
    format!("{PREFIX}:bucket:{bucket_id}:reset")
}

/// Global request counter for one unix second.
pub fn discord_global(second: i64) -> String {
    format!("{PREFIX}:discord:global:{second}")
}

pub fn discord_global_block() -> String {
    format!("{PREFIX}:discord:global:blocked")
}

pub fn verify_lock(guild_id: i64) -> String {
    format!("{PREFIX}:guild:{guild_id}:verify:lock")
}

/// Set once a run's first page has posted its start summary.
pub fn verify_started(guild_id: i64) -> String {
    format!("{PREFIX}:guild:{guild_id}:verify:started")
}

pub fn verify_member_count(guild_id: i64) -> String {
    format!("{PREFIX}:guild:{guild_id}:verify:member_count")
}

pub fn verify_runs(guild_id: i64) -> String {
    format!("{PREFIX}:guild:{guild_id}:verify:runs")
}

pub fn verify_absent(guild_id: i64) -> String {
    format!("{PREFIX}:guild:{guild_id}:verify:absent")
}

pub fn verify_approximate(guild_id: i64) -> String {
    format!("{PREFIX}:guild:{guild_id}:verify:approximate")
}

/// Every key a verification run creates besides the lock.
pub fn verify_progress(guild_id: i64) -> Vec<String> {
    vec![
        verify_member_count(guild_id),
        verify_runs(guild_id),
        verify_absent(guild_id),
        verify_approximate(guild_id),
    ]
}

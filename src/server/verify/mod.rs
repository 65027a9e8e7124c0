//! Guild verification synchronization.
//!
//! A run walks a guild's remote member list page by page in ascending id order,
//! merge-diffing each page against the internal list of verified members. Members that
//! need it get a profile lookup and a role/nickname patch, both issued through the
//! gateway. Each page is its own queued task carrying the cursor, so a crashed worker
//! loses at most one page.

pub mod diff;
pub mod embed;
pub mod engine;
pub mod patch;
pub mod template;

use std::time::Duration;

/// Length of one scheduled-verification slot.
pub const SLOT_SECONDS: i64 = 900;
const SLOTS_PER_DAY: i64 = 86_400 / SLOT_SECONDS;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerifySettings {
    /// Members fetched per page for every available API key.
    pub page_size_per_key: u32,
    /// Fraction of the approximate member count after which a run stops.
    pub convergence: f64,
    /// Pages fetched before a run stops regardless of progress.
    pub max_pages: u32,
    /// Lifetime of the per-guild run lock, renewed on every page.
    pub lock_ttl: Duration,
    /// Delay between pages of one run.
    pub page_delay: Duration,
}

impl Default for VerifySettings {
    fn default() -> Self {
        Self {
            page_size_per_key: 15,
            convergence: 0.99,
            max_pages: 50,
            lock_ttl: Duration::from_secs(600),
            page_delay: Duration::from_secs(60),
        }
    }
}

impl VerifySettings {
    /// Page size for a run with `keys` API keys, within the remote service's 1..=1000.
    pub fn page_size(&self, keys: usize) -> u32 {
        (u64::from(self.page_size_per_key) * keys as u64).clamp(1, 1000) as u32
    }
}

/// Where a guild run stands after processing one page.
///
/// A guild with no run in progress has no state; it simply holds no verification lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyState {
    Scanning { cursor: i64 },
    Reconciling,
    /// The next page is queued, starting after `cursor`.
    Rescheduled { cursor: i64 },
    Done(Finish),
}

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finish {
    /// The remote service returned a short page: every member has been seen.
    Exhausted,
    /// Enough of the approximate member count has been scanned.
    Converged,
    /// The page budget ran out first.
    PageBudget,
}

/// Whether a guild's scheduled verification falls into the slot containing `unix_time`.
///
/// Guilds are spread over the 96 quarter-hour slots of a day by id.
pub fn is_due(guild_id: i64, unix_time: i64) -> bool {
    guild_id.rem_euclid(SLOTS_PER_DAY) == unix_time.rem_euclid(86_400) / SLOT_SECONDS
}

use thiserror::Error;

/// Reasons a guild verification run refuses to start or aborts.
#[derive(Error, Debug, PartialEq)]
pub enum VerifyError {
    #[error("Verification is disabled for guild {0}")]
    Disabled(i64),

    /// No nickname template, verified roles or faction roles are configured, so a run
    /// could not change anything.
    #[error("Verification for guild {0} has nothing to apply")]
    NothingToApply(i64),

    #[error("No API keys are available from the admins of guild {0}")]
    NoAdminKeys(i64),

    /// Another run holds the per-guild lock.
    #[error("A verification run for guild {guild_id} is in progress, try again in {retry_in} seconds")]
    AlreadyRunning {
        /// Guild being verified
        guild_id: i64,
        /// Seconds until the current lock expires
        retry_in: u64,
    },

    /// An identity list handed to the merge-diff was not strictly ascending.
    #[error("Member identities must be strictly ascending: {previous} followed by {next}")]
    Unsorted {
        /// Identity seen first
        previous: i64,
        /// Identity that broke the ordering
        next: i64,
    },
}

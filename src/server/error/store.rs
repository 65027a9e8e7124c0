use thiserror::Error;

/// Failures of the shared key-value store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Redis command, script or connection failure.
    #[error(transparent)]
    Redis(#[from] redis::RedisError),

    /// A stored value could not be interpreted (e.g. a non-integer counter).
    #[error("Unexpected value stored at '{key}': {reason}")]
    Corrupt {
        /// Store key holding the value
        key: String,
        /// What was wrong with it
        reason: String,
    },
}

//! Error types for the gateway workers, verification engine and startup.
//!
//! `AppError` is the top-level error type that wraps domain-specific errors. Remote
//! service behaviour is never reported through `AppError`: the gateway returns the closed
//! `ErrorKind` outcome instead, so callers can match on it exhaustively.

pub mod config;
pub mod store;
pub mod verify;

use thiserror::Error;

use crate::server::error::{config::ConfigError, store::StoreError, verify::VerifyError};

/// Top-level application error type.
///
/// Most variants use `#[from]` for automatic error conversion with `?`.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration error during startup or environment variable loading.
    #[error(transparent)]
    ConfigErr(#[from] ConfigError),

    /// Shared key-value store failure (connection loss, script error, bad value).
    #[error(transparent)]
    StoreErr(#[from] StoreError),

    /// A guild verification run was refused or aborted.
    #[error(transparent)]
    VerifyErr(#[from] VerifyError),

    /// Database operation error from SeaORM.
    #[error(transparent)]
    DbErr(#[from] sea_orm::DbErr),

    /// HTTP client construction error from reqwest.
    #[error(transparent)]
    ReqwestErr(#[from] reqwest::Error),

    /// Discord gateway error from Serenity.
    ///
    /// Boxed due to large size.
    #[error(transparent)]
    DiscordErr(#[from] Box<serenity::Error>),

    /// Cron scheduler error.
    #[error(transparent)]
    SchedulerErr(#[from] tokio_cron_scheduler::JobSchedulerError),

    /// JSON encoding or decoding error for task payloads and stored configuration.
    #[error(transparent)]
    SerdeErr(#[from] serde_json::Error),

    /// Resource not found error.
    ///
    /// # Fields
    /// - Message describing what resource was not found
    #[error("{0}")]
    NotFound(String),
}

/// Manual conversion from serenity::Error to AppError.
///
/// Boxes the error to reduce the size of the AppError enum, as serenity::Error
/// is very large and would make all AppError variants larger if not boxed.
impl From<serenity::Error> for AppError {
    fn from(err: serenity::Error) -> Self {
        AppError::DiscordErr(Box::new(err))
    }
}

impl AppError {
    /// Whether re-running the failed unit of work later could succeed.
    ///
    /// Store and database outages are transient; configuration problems, refused
    /// verification runs and malformed payloads are not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::StoreErr(StoreError::Redis(_)) | Self::DbErr(_) | Self::ReqwestErr(_)
        )
    }
}

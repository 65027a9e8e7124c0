//! Side effects of domain errors reported by the remote services.
//!
//! The gateway only classifies failures. Some error codes mean local data is stale: a
//! game-API key that no longer works, or a log channel the bot can no longer reach.
//! This service removes that data so later runs stop hitting the same error.

use sea_orm::DatabaseConnection;

use crate::server::{
    data::{server::ServerRepository, torn_key::TornKeyRepository},
    error::AppError,
    gateway::ErrorKind,
};

/// Game-API codes after which a key must not be used again: incorrect key, owner in
/// jail, owner inactive, key paused.
pub const INVALID_KEY_CODES: [i64; 4] = [2, 10, 13, 18];

/// Chat-platform codes meaning a channel is gone or the bot lost access to it: unknown
/// channel, missing access, missing permissions.
pub const STALE_CHANNEL_CODES: [i64; 3] = [10003, 50001, 50013];

/// What the service did about an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorAction {
    KeyRemoved,
    ChannelCleared { channel_id: i64 },
    None,
}

/// Returns true when a game-API error means the key itself is unusable.
pub fn is_invalid_key(kind: &ErrorKind) -> bool {
    kind.remote_code()
        .is_some_and(|code| INVALID_KEY_CODES.contains(&code))
}

/// Returns the channel a stale-channel error refers to.
///
/// Only errors on `channels/{id}` routes qualify; the same codes on other routes say
/// nothing about a channel.
pub fn stale_channel(route: &str, kind: &ErrorKind) -> Option<i64> {
    let code = kind.remote_code()?;
    if !STALE_CHANNEL_CODES.contains(&code) {
        return None;
    }

    let mut segments = route
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .split('/')
        .filter(|s| !s.is_empty());
    match (segments.next(), segments.next()) {
        (Some("channels"), Some(id)) => id.parse().ok(),
        _ => None,
    }
}

pub struct RemoteErrorService<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> RemoteErrorService<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    /// Deletes a game-API key when the error says it can no longer be used.
    ///
    /// # Arguments
    /// - `api_key` - Key the failed call was made with
    /// - `kind` - Classified failure of that call
    ///
    /// # Returns
    /// - `Ok(RemoteErrorAction::KeyRemoved)` - Key was invalid and has been deleted
    /// - `Ok(RemoteErrorAction::None)` - Error does not concern the key
    /// - `Err(AppError::DbErr)` - Database error during delete
    pub async fn handle_torn(
        &self,
        api_key: &str,
        kind: &ErrorKind,
    ) -> Result<RemoteErrorAction, AppError> {
        if !is_invalid_key(kind) {
            return Ok(RemoteErrorAction::None);
        }

        TornKeyRepository::new(self.db).delete(api_key).await?;
        tracing::warn!("Removed game-API key after remote error: {}", kind);

        Ok(RemoteErrorAction::KeyRemoved)
    }

    /// Clears a channel from guild configuration when the chat platform reports it stale.
    ///
    /// # Arguments
    /// - `route` - Route of the failed call, e.g. `channels/123/messages`
    /// - `kind` - Classified failure of that call
    ///
    /// # Returns
    /// - `Ok(RemoteErrorAction::ChannelCleared)` - Channel removed from configuration
    /// - `Ok(RemoteErrorAction::None)` - Error does not concern a channel
    /// - `Err(AppError::DbErr)` - Database error during update
    pub async fn handle_discord(
        &self,
        route: &str,
        kind: &ErrorKind,
    ) -> Result<RemoteErrorAction, AppError> {
        let Some(channel_id) = stale_channel(route, kind) else {
            return Ok(RemoteErrorAction::None);
        };

        let cleared = ServerRepository::new(self.db).clear_channel(channel_id).await?;
        tracing::warn!(
            "Cleared channel {} from {} guild setting(s) after remote error: {}",
            channel_id,
            cleared,
            kind
        );

        Ok(RemoteErrorAction::ChannelCleared { channel_id })
    }
}

//! Game-profile lookups for verification.

use sea_orm::DatabaseConnection;

use crate::server::{
    data::user::UserRepository,
    error::AppError,
    gateway::{Credential, ErrorKind, Gateway, Method},
    model::profile::{Profile, TornProfile},
    service::remote_error::{RemoteErrorAction, RemoteErrorService},
};

/// Game-API code for an id the API does not know (here: an unlinked Discord account).
pub const UNKNOWN_USER_CODE: i64 = 6;

/// Result of looking up the game profile behind a Discord account.
#[derive(Debug)]
pub enum Lookup {
    /// Profile fetched and stored.
    Found(Profile),
    /// The Discord account is not linked to any game account.
    Unknown,
    /// The lookup may succeed later: rate limited, transient failure, or the key used
    /// was invalid and has been removed.
    Deferred(ErrorKind),
    /// The lookup failed in a way retrying will not fix.
    Failed(ErrorKind),
}

pub struct ProfileService<'a> {
    db: &'a DatabaseConnection,
    gateway: &'a Gateway,
}

impl<'a> ProfileService<'a> {
    pub fn new(db: &'a DatabaseConnection, gateway: &'a Gateway) -> Self {
        Self { db, gateway }
    }

    /// Looks up and stores the game profile linked to a Discord account.
    ///
    /// # Arguments
    /// - `discord_id` - Discord user ID of the guild member
    /// - `api_key` - Game-API key to spend on the lookup
    ///
    /// # Returns
    /// - `Ok(Lookup)` - Classified lookup result; see `Lookup`
    /// - `Err(AppError::DbErr)` - Database error while storing the profile or removing the key
    pub async fn lookup(&self, discord_id: i64, api_key: &str) -> Result<Lookup, AppError> {
        let route = format!("user/{}?selections=profile,discord", discord_id);
        let credential = Credential::ApiKey(api_key.to_string());

        let body = match self
            .gateway
            .call(Method::Get, &route, &credential, None)
            .await
        {
            Ok(Some(body)) => body,
            Ok(None) => {
                return Ok(Lookup::Failed(ErrorKind::Decode(
                    "empty profile response".to_string(),
                )))
            }
            Err(kind) => return self.classify(api_key, kind).await,
        };

        let profile: TornProfile = match serde_json::from_value(body) {
            Ok(profile) => profile,
            Err(e) => return Ok(Lookup::Failed(ErrorKind::Decode(e.to_string()))),
        };

        let profile = UserRepository::new(self.db)
            .upsert_profile(profile.into_param(discord_id))
            .await?;

        Ok(Lookup::Found(profile))
    }

    async fn classify(&self, api_key: &str, kind: ErrorKind) -> Result<Lookup, AppError> {
        if kind.remote_code() == Some(UNKNOWN_USER_CODE) {
            return Ok(Lookup::Unknown);
        }

        let action = RemoteErrorService::new(self.db)
            .handle_torn(api_key, &kind)
            .await?;
        if action == RemoteErrorAction::KeyRemoved || kind.is_retryable(Method::Get) {
            return Ok(Lookup::Deferred(kind));
        }

        Ok(Lookup::Failed(kind))
    }
}

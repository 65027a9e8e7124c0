//! User factory for creating game accounts linked to Discord accounts.

use crate::factory::helpers::next_id;
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ActiveValue, DatabaseConnection, DbErr};

/// Factory for creating test users with customizable fields.
///
/// # Example
///
/// ```rust,ignore
/// let user = UserFactory::new(&db)
///     .discord_id(123456789)
///     .name("Chedburn")
///     .build()
///     .await?;
/// ```
pub struct UserFactory<'a> {
    db: &'a DatabaseConnection,
    tid: i64,
    name: String,
    discord_id: i64,
    faction_id: Option<i64>,
    faction_position: Option<String>,
    last_refresh: DateTime<Utc>,
}

impl<'a> UserFactory<'a> {
    /// Creates a new UserFactory with default values.
    ///
    /// Defaults:
    /// - tid: auto-incremented
    /// - name: `"Player{id}"`
    /// - discord_id: `100_000 + id`
    /// - no faction, refreshed now
    pub fn new(db: &'a DatabaseConnection) -> Self {
        let id = next_id() as i64;
        Self {
            db,
            tid: id,
            name: format!("Player{}", id),
            discord_id: 100_000 + id,
            faction_id: None,
            faction_position: None,
            last_refresh: Utc::now(),
        }
    }

    pub fn tid(mut self, tid: i64) -> Self {
        self.tid = tid;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn discord_id(mut self, discord_id: i64) -> Self {
        self.discord_id = discord_id;
        self
    }

    pub fn faction_id(mut self, faction_id: Option<i64>) -> Self {
        self.faction_id = faction_id;
        self
    }

    pub fn faction_position(mut self, position: Option<String>) -> Self {
        self.faction_position = position;
        self
    }

    /// Sets the last profile refresh time, used to exercise stale-profile lookups.
    pub fn last_refresh(mut self, last_refresh: DateTime<Utc>) -> Self {
        self.last_refresh = last_refresh;
        self
    }

    /// Builds and inserts the user entity into the database.
    ///
    /// # Returns
    /// - `Ok(entity::user::Model)` - Created user entity
    /// - `Err(DbErr)` - Database error during insert
    pub async fn build(self) -> Result<entity::user::Model, DbErr> {
        entity::user::ActiveModel {
            tid: ActiveValue::Set(self.tid),
            name: ActiveValue::Set(self.name),
            discord_id: ActiveValue::Set(self.discord_id),
            faction_id: ActiveValue::Set(self.faction_id),
            faction_position: ActiveValue::Set(self.faction_position),
            last_refresh: ActiveValue::Set(self.last_refresh),
        }
        .insert(self.db)
        .await
    }
}

/// Creates a user with default values.
pub async fn create_user(db: &DatabaseConnection) -> Result<entity::user::Model, DbErr> {
    UserFactory::new(db).build().await
}

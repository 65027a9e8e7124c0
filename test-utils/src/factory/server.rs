//! Server factory for creating guild configuration rows.

use crate::factory::helpers::next_id;
use sea_orm::{ActiveModelTrait, ActiveValue, DatabaseConnection, DbErr};
use serde_json::json;

/// Factory for creating test servers with customizable verification settings.
///
/// # Example
///
/// ```rust,ignore
/// let server = ServerFactory::new(&db)
///     .verify_enabled(true)
///     .verified_roles(vec![111])
///     .build()
///     .await?;
/// ```
pub struct ServerFactory<'a> {
    db: &'a DatabaseConnection,
    guild_id: i64,
    name: String,
    admins: Vec<i64>,
    verify_enabled: bool,
    auto_verify_enabled: bool,
    gateway_verify_enabled: bool,
    verify_template: String,
    verified_roles: Vec<i64>,
    exclusion_roles: Vec<i64>,
    faction_verify: serde_json::Value,
    verify_log_channel: i64,
    verify_jail_channel: i64,
}

impl<'a> ServerFactory<'a> {
    /// Creates a new ServerFactory with default values.
    ///
    /// Defaults:
    /// - guild_id: auto-incremented
    /// - name: `"Guild {id}"`
    /// - verification disabled, default nickname template, no roles
    pub fn new(db: &'a DatabaseConnection) -> Self {
        let id = next_id();
        Self {
            db,
            guild_id: 900_000 + id as i64,
            name: format!("Guild {}", id),
            admins: Vec::new(),
            verify_enabled: false,
            auto_verify_enabled: false,
            gateway_verify_enabled: false,
            verify_template: "{{ name }} [{{ tid }}]".to_string(),
            verified_roles: Vec::new(),
            exclusion_roles: Vec::new(),
            faction_verify: json!({}),
            verify_log_channel: 0,
            verify_jail_channel: 0,
        }
    }

    pub fn guild_id(mut self, guild_id: i64) -> Self {
        self.guild_id = guild_id;
        self
    }

    pub fn admins(mut self, admins: Vec<i64>) -> Self {
        self.admins = admins;
        self
    }

    pub fn verify_enabled(mut self, enabled: bool) -> Self {
        self.verify_enabled = enabled;
        self
    }

    pub fn auto_verify_enabled(mut self, enabled: bool) -> Self {
        self.auto_verify_enabled = enabled;
        self
    }

    pub fn gateway_verify_enabled(mut self, enabled: bool) -> Self {
        self.gateway_verify_enabled = enabled;
        self
    }

    pub fn verify_template(mut self, template: impl Into<String>) -> Self {
        self.verify_template = template.into();
        self
    }

    pub fn verified_roles(mut self, roles: Vec<i64>) -> Self {
        self.verified_roles = roles;
        self
    }

    pub fn exclusion_roles(mut self, roles: Vec<i64>) -> Self {
        self.exclusion_roles = roles;
        self
    }

    /// Sets the raw faction verification map, keyed by faction id as a string.
    pub fn faction_verify(mut self, faction_verify: serde_json::Value) -> Self {
        self.faction_verify = faction_verify;
        self
    }

    pub fn verify_log_channel(mut self, channel_id: i64) -> Self {
        self.verify_log_channel = channel_id;
        self
    }

    pub fn verify_jail_channel(mut self, channel_id: i64) -> Self {
        self.verify_jail_channel = channel_id;
        self
    }

    /// Builds and inserts the server entity into the database.
    ///
    /// # Returns
    /// - `Ok(entity::server::Model)` - Created server entity
    /// - `Err(DbErr)` - Database error during insert
    pub async fn build(self) -> Result<entity::server::Model, DbErr> {
        entity::server::ActiveModel {
            guild_id: ActiveValue::Set(self.guild_id),
            name: ActiveValue::Set(self.name),
            admins: ActiveValue::Set(json!(self.admins).to_string()),
            verify_enabled: ActiveValue::Set(self.verify_enabled),
            auto_verify_enabled: ActiveValue::Set(self.auto_verify_enabled),
            gateway_verify_enabled: ActiveValue::Set(self.gateway_verify_enabled),
            verify_template: ActiveValue::Set(self.verify_template),
            verified_roles: ActiveValue::Set(json!(self.verified_roles).to_string()),
            exclusion_roles: ActiveValue::Set(json!(self.exclusion_roles).to_string()),
            faction_verify: ActiveValue::Set(self.faction_verify.to_string()),
            verify_log_channel: ActiveValue::Set(self.verify_log_channel),
            verify_jail_channel: ActiveValue::Set(self.verify_jail_channel),
        }
        .insert(self.db)
        .await
    }
}

/// Creates a server with default values.
pub async fn create_server(db: &DatabaseConnection) -> Result<entity::server::Model, DbErr> {
    ServerFactory::new(db).build().await
}

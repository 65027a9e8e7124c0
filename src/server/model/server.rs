//! Guild verification configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::server::error::AppError;

/// Verification settings for one faction inside a guild.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FactionVerify {
    #[serde(default)]
    pub enabled: bool,
    /// Roles granted to every verified member of the faction.
    #[serde(default)]
    pub roles: Vec<i64>,
    /// Roles granted per faction position, keyed by position id.
    #[serde(default)]
    pub positions: HashMap<String, Vec<i64>>,
}

/// Guild with its decoded verification configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Server {
    pub guild_id: i64,
    pub name: String,
    /// Game ids of the users whose API keys a verification run may use.
    pub admins: Vec<i64>,
    pub verify_enabled: bool,
    pub auto_verify_enabled: bool,
    pub gateway_verify_enabled: bool,
    /// Nickname template; empty leaves nicknames untouched.
    pub verify_template: String,
    pub verified_roles: Vec<i64>,
    pub exclusion_roles: Vec<i64>,
    /// Keyed by faction id.
    pub faction_verify: HashMap<i64, FactionVerify>,
    /// Channel receiving run summaries and failures, if any.
    pub verify_log_channel: Option<i64>,
    pub verify_jail_channel: Option<i64>,
}

impl Server {
    /// Converts an entity model at the repository boundary, decoding the JSON columns.
    ///
    /// # Returns
    /// - `Ok(Server)` - The decoded configuration
    /// - `Err(AppError::SerdeErr)` - A stored list or map is not valid JSON
    pub fn from_entity(entity: entity::server::Model) -> Result<Self, AppError> {
        let faction_verify: HashMap<String, FactionVerify> =
            serde_json::from_str(&entity.faction_verify)?;
        let faction_verify = faction_verify
            .into_iter()
            .filter_map(|(faction, config)| faction.parse().ok().map(|id| (id, config)))
            .collect();

        Ok(Self {
            guild_id: entity.guild_id,
            name: entity.name,
            admins: serde_json::from_str(&entity.admins)?,
            verify_enabled: entity.verify_enabled,
            auto_verify_enabled: entity.auto_verify_enabled,
            gateway_verify_enabled: entity.gateway_verify_enabled,
            verify_template: entity.verify_template,
            verified_roles: serde_json::from_str(&entity.verified_roles)?,
            exclusion_roles: serde_json::from_str(&entity.exclusion_roles)?,
            faction_verify,
            verify_log_channel: (entity.verify_log_channel != 0).then_some(entity.verify_log_channel),
            verify_jail_channel: (entity.verify_jail_channel != 0)
                .then_some(entity.verify_jail_channel),
        })
    }

    /// Whether a verification run could change any member's nickname or roles.
    pub fn applies_anything(&self) -> bool {
        !self.verify_template.trim().is_empty()
            || !self.verified_roles.is_empty()
            || self
                .faction_verify
                .values()
                .any(|f| f.enabled && (!f.roles.is_empty() || f.positions.values().any(|r| !r.is_empty())))
    }

    pub fn is_excluded(&self, roles: &[i64]) -> bool {
        roles.iter().any(|role| self.exclusion_roles.contains(role))
    }
}

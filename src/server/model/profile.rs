//! Game profiles of verified users.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// A user's faction membership as last seen.
#[derive(Debug, Clone, PartialEq)]
pub struct FactionMembership {
    pub faction_id: i64,
    pub tag: String,
    pub position: Option<String>,
    /// Id of `position` in the faction's position list, when known.
    pub position_id: Option<String>,
}

/// Stored profile of a game account linked to a Discord account.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub tid: i64,
    pub name: String,
    pub discord_id: i64,
    pub faction: Option<FactionMembership>,
    pub last_refresh: DateTime<Utc>,
}

impl Profile {
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: chrono::Duration) -> bool {
        now - self.last_refresh > max_age
    }
}

/// Fields written when a profile lookup succeeds.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertProfileParam {
    pub tid: i64,
    pub name: String,
    pub discord_id: i64,
    /// (faction id, name, tag)
    pub faction: Option<(i64, String, String)>,
    pub position: Option<String>,
}

/// Game-API `user/{id}?selections=profile,discord` response.
#[derive(Debug, Deserialize)]
pub struct TornProfile {
    pub player_id: i64,
    pub name: String,
    #[serde(default)]
    pub faction: Option<TornFaction>,
    #[serde(default)]
    pub discord: Option<TornDiscord>,
}

#[derive(Debug, Deserialize)]
pub struct TornFaction {
    #[serde(default)]
    pub faction_id: i64,
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub faction_name: String,
    #[serde(default)]
    pub faction_tag: String,
}

#[derive(Debug, Deserialize)]
pub struct TornDiscord {
    #[serde(rename = "discordID", default)]
    pub discord_id: String,
}

impl TornProfile {
    /// Converts the lookup into upsert parameters.
    ///
    /// Faction id 0 means factionless. The linked Discord id falls back to the id the
    /// lookup was made with when the response omits it.
    pub fn into_param(self, looked_up_discord_id: i64) -> UpsertProfileParam {
        let discord_id = self
            .discord
            .and_then(|d| d.discord_id.parse().ok())
            .unwrap_or(looked_up_discord_id);
        let (faction, position) = match self.faction.filter(|f| f.faction_id != 0) {
            Some(f) => {
                let position = (!f.position.is_empty() && f.position != "None")
                    .then_some(f.position);
                (
                    Some((f.faction_id, f.faction_name, f.faction_tag)),
                    position,
                )
            }
            None => (None, None),
        };

        UpsertProfileParam {
            tid: self.player_id,
            name: self.name,
            discord_id,
            faction,
            position,
        }
    }
}

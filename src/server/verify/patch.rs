//! Role and nickname deltas for one member.

use serde_json::{Map, Value};
use std::collections::BTreeSet;

use super::template;
use crate::server::model::{member::MemberSnapshot, profile::Profile, server::Server};

/// Changes to send for one member. Unchanged fields are `None`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RolePatch {
    pub nick: Option<String>,
    /// Full replacement role list.
    pub roles: Option<Vec<i64>>,
}

impl RolePatch {
    /// Computes the patch bringing a member in line with their profile.
    ///
    /// Desired roles are the guild's verified roles plus, when the member's faction is
    /// enabled, the faction roles and the roles of the member's position. Roles of other
    /// factions, and position roles of positions the member does not hold, are removed
    /// unless they are also desired. Roles unrelated to verification are kept.
    ///
    /// # Arguments
    /// - `server` - Guild verification configuration
    /// - `profile` - The member's stored game profile
    /// - `member` - The member's current state in the guild
    ///
    /// # Returns
    /// - `RolePatch` - Possibly empty; see `is_empty`
    pub fn compute(server: &Server, profile: &Profile, member: &MemberSnapshot) -> Self {
        let nick = template::render(&server.verify_template, profile)
            .filter(|nick| member.display_name() != nick.as_str());

        let own_faction = profile.faction.as_ref();
        let mut desired: BTreeSet<i64> = server.verified_roles.iter().copied().collect();
        let mut invalid: BTreeSet<i64> = BTreeSet::new();

        for (faction_id, config) in &server.faction_verify {
            let own = own_faction.filter(|f| f.faction_id == *faction_id);
            match own {
                Some(membership) => {
                    let position = membership.position_id.as_deref();
                    if config.enabled {
                        desired.extend(&config.roles);
                        if let Some(roles) = position.and_then(|p| config.positions.get(p)) {
                            desired.extend(roles);
                        }
                    }
                    for (position_id, roles) in &config.positions {
                        if Some(position_id.as_str()) != position {
                            invalid.extend(roles);
                        }
                    }
                }
                None => {
                    invalid.extend(&config.roles);
                    invalid.extend(config.positions.values().flatten());
                }
            }
        }

        let current: BTreeSet<i64> = member.roles.iter().copied().collect();
        let next: BTreeSet<i64> = current
            .iter()
            .filter(|role| !invalid.contains(*role) || desired.contains(*role))
            .chain(desired.iter())
            .copied()
            .collect();
        let roles = (next != current).then(|| next.into_iter().collect());

        Self { nick, roles }
    }

    pub fn is_empty(&self) -> bool {
        self.nick.is_none() && self.roles.is_none()
    }

    /// JSON body for `PATCH guilds/{guild}/members/{user}`.
    pub fn to_payload(&self) -> Value {
        let mut body = Map::new();
        if let Some(nick) = &self.nick {
            body.insert("nick".to_string(), Value::String(nick.clone()));
        }
        if let Some(roles) = &self.roles {
            body.insert(
                "roles".to_string(),
                Value::Array(roles.iter().map(|r| Value::String(r.to_string())).collect()),
            );
        }
        Value::Object(body)
    }
}

//! Snapshot of a remote guild member.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serenity::all::Member;

/// The parts of a guild member verification needs, captured once per page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberSnapshot {
    pub user_id: i64,
    pub roles: Vec<i64>,
    pub nick: Option<String>,
    /// Account name shown when the member has no guild nickname.
    #[serde(default)]
    pub username: String,
    /// Bots and system users are never verified.
    pub automated: bool,
}

/// One decoded member-list page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberPage {
    /// Members sorted by ascending user id with duplicates removed.
    pub members: Vec<MemberSnapshot>,
    /// Number of entries in the raw array, before deduplication.
    pub raw_len: usize,
}

/// Discord's member object as returned by `GET guilds/{id}/members`.
#[derive(Deserialize)]
struct RawMember {
    user: RawUser,
    #[serde(default)]
    roles: Vec<String>,
    nick: Option<String>,
}

#[derive(Deserialize)]
struct RawUser {
    id: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    bot: bool,
    #[serde(default)]
    system: bool,
}

impl MemberSnapshot {
    /// Parses one member object from a member-list page.
    ///
    /// # Returns
    /// - `Some(MemberSnapshot)` - Parsed member
    /// - `None` - The object is not a member or carries a non-numeric id
    pub fn from_json(value: &Value) -> Option<Self> {
        let raw: RawMember = serde_json::from_value(value.clone()).ok()?;

        Some(Self {
            user_id: raw.user.id.parse().ok()?,
            roles: raw.roles.iter().filter_map(|r| r.parse().ok()).collect(),
            nick: raw.nick,
            username: raw.user.username,
            automated: raw.user.bot || raw.user.system,
        })
    }

    /// Parses a member-list page.
    ///
    /// A page that is not an array, or that holds an entry which is not a member, is
    /// rejected as a whole: treating it as empty would mark every stored member absent.
    ///
    /// # Returns
    /// - `Ok(MemberPage)` - Sorted, deduplicated members and the raw entry count
    /// - `Err(String)` - Description of why the page was rejected
    pub fn page_from_json(value: &Value) -> Result<MemberPage, String> {
        let items = value
            .as_array()
            .ok_or_else(|| format!("member page is not an array: {}", value))?;

        let mut members = items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                Self::from_json(item)
                    .ok_or_else(|| format!("member page entry {} is not a member", index))
            })
            .collect::<Result<Vec<Self>, String>>()?;
        members.sort_by_key(|m| m.user_id);
        members.dedup_by_key(|m| m.user_id);

        Ok(MemberPage {
            members,
            raw_len: items.len(),
        })
    }

    /// Name the member is currently shown under: the guild nickname, else the username.
    pub fn display_name(&self) -> &str {
        self.nick.as_deref().unwrap_or(&self.username)
    }
}

impl From<&Member> for MemberSnapshot {
    fn from(member: &Member) -> Self {
        Self {
            user_id: member.user.id.get() as i64,
            roles: member.roles.iter().map(|r| r.get() as i64).collect(),
            nick: member.nick.clone(),
            username: member.user.name.clone(),
            automated: member.user.bot || member.user.system,
        }
    }
}

//! Log-channel messages posted by verification runs.

use serenity::all::{
    CreateActionRow, CreateButton, CreateEmbed, CreateEmbedAuthor, CreateEmbedFooter,
    CreateMessage, Timestamp,
};

use super::{patch::RolePatch, Finish};
use crate::server::{
    gateway::{ErrorKind, NetworkErrorKind},
    model::member::MemberSnapshot,
};

const INFO_COLOR: u32 = 0x5865F2;
const GOOD_COLOR: u32 = 0x32A852;
const ERROR_COLOR: u32 = 0xC83F49;
const OFFICIAL_SERVER_URL: &str = "https://www.torn.com/discord";

pub fn run_started(guild_name: &str, keys: usize, approximate_members: i64) -> CreateMessage {
    let embed = CreateEmbed::new()
        .title("Verification Started")
        .description(format!(
            "Verification of members of {} has started <t:{}:R>.\n\nAPI Keys: {}\nEstimated Members: {}",
            guild_name,
            chrono::Utc::now().timestamp(),
            keys,
            approximate_members
        ))
        .color(INFO_COLOR)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new("tornsync"));

    CreateMessage::new().embed(embed)
}

/// Summary of a finished run.
pub struct RunSummary {
    pub finish: Finish,
    pub approximate_members: i64,
    pub attempted: i64,
    pub pages: i64,
    pub removed: u64,
}

pub fn run_finished(guild_name: &str, summary: &RunSummary) -> CreateMessage {
    let reason = match summary.finish {
        Finish::Exhausted => "every member was checked",
        Finish::Converged => "nearly every member was checked",
        Finish::PageBudget => "the page limit was reached",
    };
    let embed = CreateEmbed::new()
        .title("Verification Finished")
        .description(format!(
            "Verification of members of {} has finished <t:{}:R> ({}).\n\nEstimated Members: {}\nMembers Attempted: {}\nPages Fetched: {}\nMembers Removed: {}",
            guild_name,
            chrono::Utc::now().timestamp(),
            reason,
            summary.approximate_members,
            summary.attempted,
            summary.pages,
            summary.removed
        ))
        .color(INFO_COLOR)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new("tornsync"));

    CreateMessage::new().embed(embed)
}

/// Logged when a run cannot fetch a page of the guild's members and gives up.
pub fn page_fetch_failed(kind: &ErrorKind) -> CreateMessage {
    let (title, description) = match kind {
        ErrorKind::Remote { code, message } => (
            "Discord API Error",
            format!(
                "The Discord API has raised error code {}: \"{}\".",
                code, message
            ),
        ),
        ErrorKind::Network(NetworkErrorKind::Status(status)) => (
            "Discord HTTP Error",
            format!("The Discord API has returned an HTTP error {}.", status),
        ),
        other => (
            "Discord HTTP Error",
            format!("The member list could not be fetched: {}.", other),
        ),
    };
    let embed = CreateEmbed::new()
        .title(title)
        .description(description)
        .color(ERROR_COLOR);

    CreateMessage::new().embed(embed)
}

/// Logged when a patch is queued for a member.
pub fn verification_attempted(member: &MemberSnapshot, patch: &RolePatch) -> CreateMessage {
    let nickname = match &patch.nick {
        Some(nick) => format!("{} -> {}", member.display_name(), nick),
        None => "Unchanged".to_string(),
    };
    let (added, removed) = match &patch.roles {
        Some(roles) => (
            roles.iter().filter(|r| !member.roles.contains(r)).copied().collect(),
            member.roles.iter().filter(|r| !roles.contains(r)).copied().collect(),
        ),
        None => (Vec::new(), Vec::new()),
    };

    let embed = CreateEmbed::new()
        .title("API Verification Attempted")
        .description(format!(
            "<@{}> is officially verified by Torn. Their roles and nickname are being updated.",
            member.user_id
        ))
        .author(CreateEmbedAuthor::new(member.display_name()))
        .field("Nickname", nickname, false)
        .field("Roles Added", role_mentions(&added), false)
        .field("Roles Removed", role_mentions(&removed), false)
        .color(GOOD_COLOR)
        .timestamp(Timestamp::now());

    CreateMessage::new().embed(embed)
}

fn role_mentions(roles: &[i64]) -> String {
    if roles.is_empty() {
        return "None".to_string();
    }
    roles
        .iter()
        .map(|role| format!("<@&{}>", role))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Posted to the jail channel once a newly joined member's patch went through.
pub fn verification_complete(guild_name: &str, user_id: i64) -> CreateMessage {
    let embed = CreateEmbed::new()
        .title("Verification Complete")
        .description(format!(
            "Welcome to {}, <@{}>. Your verification should now be complete. Contact server \
             administrators if you are having any issues with verification.",
            guild_name, user_id
        ))
        .color(GOOD_COLOR);

    CreateMessage::new()
        .content(format!("<@{}>", user_id))
        .embed(embed)
}

/// Logged when the game API does not know a member's Discord account.
pub fn lookup_failed(user_id: i64) -> CreateMessage {
    let embed = CreateEmbed::new()
        .title("API Verification Failed")
        .description(format!(
            "<@{}> is not linked to a game account and is most likely not verified.",
            user_id
        ))
        .color(ERROR_COLOR);

    CreateMessage::new().embed(embed)
}

/// Posted to the jail channel for a newly joined member who could not be verified.
pub fn jail_notice(user_id: i64) -> CreateMessage {
    let embed = CreateEmbed::new()
        .title("API Verification Failed")
        .description(format!(
            "<@{}> could not be verified. Please make sure your Discord account is linked \
             through the official game server, then ask a staff member to verify you again.",
            user_id
        ))
        .color(ERROR_COLOR);
    let button = CreateButton::new_link(OFFICIAL_SERVER_URL).label("Official Discord Server");

    CreateMessage::new()
        .content(format!("<@{}>", user_id))
        .embed(embed)
        .components(vec![CreateActionRow::Buttons(vec![button])])
}

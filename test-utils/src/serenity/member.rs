//! Test factory for creating Serenity Member objects.

use serenity::all::Member;

/// Creates a test Serenity Member with customizable fields.
///
/// # Arguments
/// - `guild_id` - Guild the member joined
/// - `user_id` - Discord user id (snowflake)
/// - `roles` - Role ids currently held
/// - `nick` - Guild nickname, if any
/// - `bot` - Whether the account is a bot
///
/// # Returns
/// - `Member` - A valid Serenity Member struct for testing
///
/// # Panics
/// - If the JSON cannot be deserialized into a Member (indicates invalid test data)
pub fn create_test_member(
    guild_id: u64,
    user_id: u64,
    roles: &[u64],
    nick: Option<&str>,
    bot: bool,
) -> Member {
    let roles: Vec<String> = roles.iter().map(|r| r.to_string()).collect();
    serde_json::from_value(serde_json::json!({
        "guild_id": guild_id.to_string(),
        "user": {
            "id": user_id.to_string(),
            "username": format!("user{}", user_id),
            "discriminator": "0000",
            "global_name": null,
            "avatar": null,
            "bot": bot,
        },
        "nick": nick,
        "avatar": null,
        "roles": roles,
        "joined_at": "2026-01-01T00:00:00.000000+00:00",
        "premium_since": null,
        "deaf": false,
        "mute": false,
        "flags": 0,
        "pending": false,
        "permissions": null,
        "communication_disabled_until": null,
    }))
    .expect("Failed to create test member")
}

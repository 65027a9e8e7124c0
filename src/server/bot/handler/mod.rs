use serenity::all::{Context, EventHandler, GuildId, Member, Ready, User};
use serenity::async_trait;

use crate::server::state::AppState;

pub mod member;
pub mod ready;

/// Discord bot event handler
pub struct Handler {
    pub state: AppState,
}

impl Handler {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl EventHandler for Handler {
    /// Called when the bot is ready and connected to Discord
    async fn ready(&self, ctx: Context, ready: Ready) {
        ready::handle_ready(ctx, ready).await;
    }

    /// Called when a member joins a guild
    async fn guild_member_addition(&self, ctx: Context, new_member: Member) {
        member::handle_guild_member_addition(&self.state, ctx, new_member).await;
    }

    /// Called when a member leaves a guild
    async fn guild_member_removal(
        &self,
        ctx: Context,
        guild_id: GuildId,
        user: User,
        member_data_if_available: Option<Member>,
    ) {
        member::handle_guild_member_removal(
            &self.state,
            ctx,
            guild_id,
            user,
            member_data_if_available,
        )
        .await;
    }
}

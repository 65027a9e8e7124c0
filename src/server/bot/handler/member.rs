use serenity::all::{Context, GuildId, Member, User};

use crate::server::{
    data::{guild_member::GuildMemberRepository, server::ServerRepository},
    error::AppError,
    model::member::MemberSnapshot,
    state::AppState,
    task::Task,
};

/// Handles the guild_member_addition event when a member joins a guild
pub async fn handle_guild_member_addition(state: &AppState, _ctx: Context, new_member: Member) {
    let guild_id = new_member.guild_id.get() as i64;
    let member = MemberSnapshot::from(&new_member);

    if let Err(e) = member_joined(state, guild_id, member).await {
        tracing::error!("Failed to queue joined member: {}", e);
    }
}

/// Handles the guild_member_removal event when a member leaves a guild
pub async fn handle_guild_member_removal(
    state: &AppState,
    _ctx: Context,
    guild_id: GuildId,
    user: User,
    _member_data_if_available: Option<Member>,
) {
    if let Err(e) = member_left(state, guild_id.get() as i64, user.id.get() as i64).await {
        tracing::error!("Failed to remove departed member: {:?}", e);
    }
}

/// Queues work for a member who just joined.
///
/// Guilds with join-time verification get a full `VerifyMember` task; every other known
/// guild only records the membership so the next scheduled run sees it.
///
/// # Arguments
/// - `state` - Shared application state
/// - `guild_id` - Guild the member joined
/// - `member` - Snapshot taken from the join event
///
/// # Returns
/// - `Ok(())` - A task was queued, or the guild/member needs no work
/// - `Err(AppError)` - Database or store error
pub async fn member_joined(
    state: &AppState,
    guild_id: i64,
    member: MemberSnapshot,
) -> Result<(), AppError> {
    let Some(server) = ServerRepository::new(&state.db)
        .find_by_guild_id(guild_id)
        .await?
    else {
        tracing::warn!("Received member_add event for unknown guild {}", guild_id);
        return Ok(());
    };

    if member.automated {
        return Ok(());
    }

    let task = if server.verify_enabled && server.gateway_verify_enabled {
        Task::VerifyMember {
            guild_id,
            member,
            force: false,
            joined: true,
        }
    } else {
        Task::RecordMember {
            guild_id,
            user_id: member.user_id,
        }
    };

    state.queue.push(task).await
}

/// Drops a departed member from the internal member list.
pub async fn member_left(state: &AppState, guild_id: i64, user_id: i64) -> Result<(), AppError> {
    let removed = GuildMemberRepository::new(&state.db)
        .delete_many(guild_id, &[user_id])
        .await?;

    if removed > 0 {
        tracing::debug!("User {} left guild {} - membership removed", user_id, guild_id);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use test_utils::{factory, serenity::create_test_member};

    use crate::server::{
        gateway::transport::{mock::ScriptedTransport, TransportError},
        state::test::state_with,
        verify::VerifySettings,
    };

    fn offline() -> Arc<ScriptedTransport> {
        Arc::new(ScriptedTransport::new(|_| {
            Err(TransportError::Connection("offline".to_string()))
        }))
    }

    #[tokio::test]
    async fn join_with_gateway_verification_queues_verify_member() {
        let (test, state) = state_with(offline(), VerifySettings::default()).await;
        let server = factory::server::ServerFactory::new(test.db.as_ref().unwrap())
            .verify_enabled(true)
            .gateway_verify_enabled(true)
            .build()
            .await
            .unwrap();
        let member = create_test_member(server.guild_id as u64, 42, &[5], None, false);

        member_joined(&state, server.guild_id, MemberSnapshot::from(&member))
            .await
            .unwrap();

        let envelope = state.queue.pop_due().await.unwrap().unwrap();
        match envelope.task {
            Task::VerifyMember {
                guild_id,
                member,
                force,
                joined,
            } => {
                assert_eq!(guild_id, server.guild_id);
                assert_eq!(member.user_id, 42);
                assert_eq!(member.roles, vec![5]);
                assert!(!force);
                assert!(joined);
            }
            other => panic!("unexpected task {:?}", other),
        }
    }

    #[tokio::test]
    async fn join_without_gateway_verification_records_member() {
        let (test, state) = state_with(offline(), VerifySettings::default()).await;
        let server = factory::server::ServerFactory::new(test.db.as_ref().unwrap())
            .verify_enabled(true)
            .build()
            .await
            .unwrap();
        let member = create_test_member(server.guild_id as u64, 42, &[], None, false);

        member_joined(&state, server.guild_id, MemberSnapshot::from(&member))
            .await
            .unwrap();

        let envelope = state.queue.pop_due().await.unwrap().unwrap();
        assert_eq!(
            envelope.task,
            Task::RecordMember {
                guild_id: server.guild_id,
                user_id: 42
            }
        );
    }

    #[tokio::test]
    async fn join_of_unknown_guild_or_bot_queues_nothing() {
        let (test, state) = state_with(offline(), VerifySettings::default()).await;
        let server = factory::server::ServerFactory::new(test.db.as_ref().unwrap())
            .verify_enabled(true)
            .gateway_verify_enabled(true)
            .build()
            .await
            .unwrap();

        let stranger = create_test_member(1, 42, &[], None, false);
        member_joined(&state, 1, MemberSnapshot::from(&stranger))
            .await
            .unwrap();
        let bot = create_test_member(server.guild_id as u64, 43, &[], None, true);
        member_joined(&state, server.guild_id, MemberSnapshot::from(&bot))
            .await
            .unwrap();

        assert!(state.queue.pop_due().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn leave_removes_membership_row() {
        let (test, state) = state_with(offline(), VerifySettings::default()).await;
        let db = test.db.as_ref().unwrap();
        let server = factory::create_server(db).await.unwrap();
        factory::create_guild_member(db, server.guild_id, 42).await.unwrap();
        factory::create_guild_member(db, server.guild_id, 43).await.unwrap();

        member_left(&state, server.guild_id, 42).await.unwrap();

        let remaining = GuildMemberRepository::new(db)
            .user_ids_after(server.guild_id, 0)
            .await
            .unwrap();
        assert_eq!(remaining, vec![43]);
    }
}

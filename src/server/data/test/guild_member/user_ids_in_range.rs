use super::*;

/// Tests that the page window excludes the cursor and includes the page maximum.
///
/// Expected: Ok with ascending ids in (after, up_to]
#[tokio::test]
async fn returns_ids_within_page_window() -> Result<(), DbErr> {
    let test = TestBuilder::new()
        .with_table(entity::prelude::Server)
        .with_table(entity::prelude::GuildMember)
        .build()
        .await
        .unwrap();
    let db = test.db.as_ref().unwrap();

    let server = factory::create_server(db).await?;
    for user_id in [40, 10, 30, 20, 50] {
        factory::create_guild_member(db, server.guild_id, user_id).await?;
    }

    let repo = GuildMemberRepository::new(db);
    let ids = repo.user_ids_in_range(server.guild_id, 10, 40).await?;

    assert_eq!(ids, vec![20, 30, 40]);

    Ok(())
}

/// Tests that members of other guilds never leak into a guild's list.
///
/// Expected: Ok with only the requested guild's ids
#[tokio::test]
async fn ignores_other_guilds() -> Result<(), DbErr> {
    let test = TestBuilder::new()
        .with_table(entity::prelude::Server)
        .with_table(entity::prelude::GuildMember)
        .build()
        .await
        .unwrap();
    let db = test.db.as_ref().unwrap();

    let server = factory::create_server(db).await?;
    let other = factory::create_server(db).await?;
    factory::create_guild_member(db, server.guild_id, 5).await?;
    factory::create_guild_member(db, other.guild_id, 6).await?;

    let repo = GuildMemberRepository::new(db);

    assert_eq!(repo.user_ids_after(server.guild_id, 0).await?, vec![5]);

    Ok(())
}

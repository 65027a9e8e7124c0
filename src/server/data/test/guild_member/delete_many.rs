use super::*;

/// Tests deleting confirmed-absent members.
///
/// Expected: Ok(2) with the remaining member untouched
#[tokio::test]
async fn deletes_listed_members() -> Result<(), DbErr> {
    let test = TestBuilder::new()
        .with_table(entity::prelude::Server)
        .with_table(entity::prelude::GuildMember)
        .build()
        .await
        .unwrap();
    let db = test.db.as_ref().unwrap();

    let server = factory::create_server(db).await?;
    for user_id in [1, 2, 3] {
        factory::create_guild_member(db, server.guild_id, user_id).await?;
    }

    let repo = GuildMemberRepository::new(db);
    let deleted = repo.delete_many(server.guild_id, &[1, 3, 99]).await?;

    assert_eq!(deleted, 2);
    assert_eq!(repo.user_ids_after(server.guild_id, 0).await?, vec![2]);

    Ok(())
}

/// Tests that an empty id list is a no-op.
///
/// Expected: Ok(0)
#[tokio::test]
async fn empty_list_deletes_nothing() -> Result<(), DbErr> {
    let test = TestBuilder::new()
        .with_table(entity::prelude::Server)
        .with_table(entity::prelude::GuildMember)
        .build()
        .await
        .unwrap();
    let db = test.db.as_ref().unwrap();

    let server = factory::create_server(db).await?;
    factory::create_guild_member(db, server.guild_id, 1).await?;

    let repo = GuildMemberRepository::new(db);

    assert_eq!(repo.delete_many(server.guild_id, &[]).await?, 0);
    assert_eq!(repo.user_ids_after(server.guild_id, 0).await?, vec![1]);

    Ok(())
}

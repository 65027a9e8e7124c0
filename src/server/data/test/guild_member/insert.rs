use super::*;

/// Tests that recording the same member twice keeps a single row.
///
/// Expected: Ok(true) then Ok(false)
#[tokio::test]
async fn inserts_member_once() -> Result<(), DbErr> {
    let test = TestBuilder::new()
        .with_table(entity::prelude::Server)
        .with_table(entity::prelude::GuildMember)
        .build()
        .await
        .unwrap();
    let db = test.db.as_ref().unwrap();

    let server = factory::create_server(db).await?;

    let repo = GuildMemberRepository::new(db);

    assert!(repo.insert(server.guild_id, 77).await?);
    assert!(!repo.insert(server.guild_id, 77).await?);
    assert_eq!(repo.user_ids_after(server.guild_id, 0).await?, vec![77]);

    Ok(())
}

use super::*;

/// Tests clearing a log channel that the chat platform no longer lets us post to.
///
/// Verifies that only guilds referencing the channel are touched.
///
/// Expected: Ok(1) and the channel unset on the matching guild
#[tokio::test]
async fn clears_matching_log_channel() -> Result<(), DbErr> {
    let test = TestBuilder::new()
        .with_table(entity::prelude::Server)
        .build()
        .await
        .unwrap();
    let db = test.db.as_ref().unwrap();

    let affected = factory::server::ServerFactory::new(db)
        .verify_log_channel(555)
        .build()
        .await?;
    let other = factory::server::ServerFactory::new(db)
        .verify_log_channel(666)
        .build()
        .await?;

    let repo = ServerRepository::new(db);
    let cleared = repo.clear_channel(555).await?;

    assert_eq!(cleared, 1);
    let affected = repo.find_by_guild_id(affected.guild_id).await.unwrap().unwrap();
    let other = repo.find_by_guild_id(other.guild_id).await.unwrap().unwrap();
    assert_eq!(affected.verify_log_channel, None);
    assert_eq!(other.verify_log_channel, Some(666));

    Ok(())
}

/// Tests clearing a channel nobody references.
///
/// Expected: Ok(0)
#[tokio::test]
async fn clears_nothing_for_unknown_channel() -> Result<(), DbErr> {
    let test = TestBuilder::new()
        .with_table(entity::prelude::Server)
        .build()
        .await
        .unwrap();
    let db = test.db.as_ref().unwrap();

    factory::server::create_server(db).await?;

    let repo = ServerRepository::new(db);

    assert_eq!(repo.clear_channel(1).await?, 0);

    Ok(())
}

use super::*;

/// Tests that only guilds with both verification switches on are listed.
///
/// Expected: Ok with the single fully-enabled guild
#[tokio::test]
async fn lists_only_auto_verifying_guilds() -> Result<(), DbErr> {
    let test = TestBuilder::new()
        .with_table(entity::prelude::Server)
        .build()
        .await
        .unwrap();
    let db = test.db.as_ref().unwrap();

    let enabled = factory::server::ServerFactory::new(db)
        .verify_enabled(true)
        .auto_verify_enabled(true)
        .build()
        .await?;
    factory::server::ServerFactory::new(db)
        .verify_enabled(true)
        .auto_verify_enabled(false)
        .build()
        .await?;
    factory::server::ServerFactory::new(db)
        .verify_enabled(false)
        .auto_verify_enabled(true)
        .build()
        .await?;

    let repo = ServerRepository::new(db);
    let ids = repo.auto_verify_guild_ids().await?;

    assert_eq!(ids, vec![enabled.guild_id]);

    Ok(())
}

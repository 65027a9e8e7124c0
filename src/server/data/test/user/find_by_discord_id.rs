use super::*;

/// Tests resolving a linked profile with faction and position.
///
/// Verifies that the faction tag and the position id are loaded from their tables.
///
/// Expected: Ok(Some(Profile)) with faction membership
#[tokio::test]
async fn loads_faction_membership() -> Result<(), DbErr> {
    let test = TestBuilder::new()
        .with_verification_tables()
        .build()
        .await
        .unwrap();
    let db = test.db.as_ref().unwrap();

    let faction = factory::create_faction(db).await?;
    let position = factory::create_faction_position(db, faction.tid, "Lieutenant").await?;
    let user = factory::user::UserFactory::new(db)
        .discord_id(4242)
        .faction_id(Some(faction.tid))
        .faction_position(Some("Lieutenant".to_string()))
        .build()
        .await?;

    let repo = UserRepository::new(db);
    let profile = repo.find_by_discord_id(4242).await?.unwrap();

    assert_eq!(profile.tid, user.tid);
    let membership = profile.faction.unwrap();
    assert_eq!(membership.faction_id, faction.tid);
    assert_eq!(membership.tag, faction.tag);
    assert_eq!(membership.position.as_deref(), Some("Lieutenant"));
    assert_eq!(membership.position_id, Some(position.pid));

    Ok(())
}

/// Tests a faction member whose position has no stored id.
///
/// Expected: Ok(Some(Profile)) with `position_id` of None
#[tokio::test]
async fn unknown_position_has_no_id() -> Result<(), DbErr> {
    let test = TestBuilder::new()
        .with_verification_tables()
        .build()
        .await
        .unwrap();
    let db = test.db.as_ref().unwrap();

    let faction = factory::create_faction(db).await?;
    factory::user::UserFactory::new(db)
        .discord_id(31)
        .faction_id(Some(faction.tid))
        .faction_position(Some("Recruit".to_string()))
        .build()
        .await?;

    let repo = UserRepository::new(db);
    let profile = repo.find_by_discord_id(31).await?.unwrap();

    assert_eq!(profile.faction.unwrap().position_id, None);

    Ok(())
}

/// Tests looking up a Discord account nobody linked.
///
/// Expected: Ok(None)
#[tokio::test]
async fn returns_none_for_unlinked_account() -> Result<(), DbErr> {
    let test = TestBuilder::new()
        .with_verification_tables()
        .build()
        .await
        .unwrap();
    let db = test.db.as_ref().unwrap();

    let repo = UserRepository::new(db);

    assert!(repo.find_by_discord_id(1).await?.is_none());

    Ok(())
}

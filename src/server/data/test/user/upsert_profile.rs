use super::*;
use sea_orm::EntityTrait;

/// Tests storing a profile for a new faction member.
///
/// Verifies that the faction row is created alongside the user.
///
/// Expected: Ok(Profile) with faction tag populated
#[tokio::test]
async fn creates_user_and_faction() -> Result<(), DbErr> {
    let test = TestBuilder::new()
        .with_verification_tables()
        .build()
        .await
        .unwrap();
    let db = test.db.as_ref().unwrap();

    let repo = UserRepository::new(db);
    let profile = repo
        .upsert_profile(UpsertProfileParam {
            tid: 2_000_001,
            name: "Newbie".to_string(),
            discord_id: 808,
            faction: Some((77, "The Company".to_string(), "CO".to_string())),
            position: Some("Member".to_string()),
        })
        .await?;

    assert_eq!(profile.name, "Newbie");
    assert_eq!(profile.discord_id, 808);
    let membership = profile.faction.unwrap();
    assert_eq!(membership.faction_id, 77);
    assert_eq!(membership.tag, "CO");

    let faction = entity::prelude::Faction::find_by_id(77).one(db).await?;
    assert_eq!(faction.map(|f| f.name), Some("The Company".to_string()));

    Ok(())
}

/// Tests refreshing an existing profile after the user left their faction.
///
/// Expected: Ok(Profile) with no faction and a newer refresh time
#[tokio::test]
async fn refreshes_existing_user() -> Result<(), DbErr> {
    let test = TestBuilder::new()
        .with_verification_tables()
        .build()
        .await
        .unwrap();
    let db = test.db.as_ref().unwrap();

    let faction = factory::create_faction(db).await?;
    let user = factory::user::UserFactory::new(db)
        .faction_id(Some(faction.tid))
        .last_refresh(chrono::Utc::now() - chrono::Duration::days(3))
        .build()
        .await?;

    let repo = UserRepository::new(db);
    let profile = repo
        .upsert_profile(UpsertProfileParam {
            tid: user.tid,
            name: "Renamed".to_string(),
            discord_id: user.discord_id,
            faction: None,
            position: None,
        })
        .await?;

    assert_eq!(profile.name, "Renamed");
    assert!(profile.faction.is_none());
    assert!(profile.last_refresh > user.last_refresh);

    Ok(())
}

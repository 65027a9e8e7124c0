use super::*;
use serde_json::json;

/// Tests loading a configured guild.
///
/// Verifies that the JSON columns are decoded into the domain model, including the
/// per-faction role mapping.
///
/// Expected: Ok(Some(Server))
#[tokio::test]
async fn decodes_configured_guild() -> Result<(), DbErr> {
    let test = TestBuilder::new()
        .with_table(entity::prelude::Server)
        .build()
        .await
        .unwrap();
    let db = test.db.as_ref().unwrap();

    let stored = factory::server::ServerFactory::new(db)
        .admins(vec![1, 2])
        .verified_roles(vec![10])
        .faction_verify(json!({
            "42": {"enabled": true, "roles": [20], "positions": {"pos-1": [30]}}
        }))
        .verify_log_channel(700)
        .build()
        .await?;

    let repo = ServerRepository::new(db);
    let server = repo.find_by_guild_id(stored.guild_id).await.unwrap().unwrap();

    assert_eq!(server.admins, vec![1, 2]);
    assert_eq!(server.verified_roles, vec![10]);
    assert_eq!(server.verify_log_channel, Some(700));
    let faction = server.faction_verify.get(&42).unwrap();
    assert!(faction.enabled);
    assert_eq!(faction.roles, vec![20]);
    assert_eq!(faction.positions.get("pos-1"), Some(&vec![30]));

    Ok(())
}

/// Tests looking up a guild that has never been configured.
///
/// Expected: Ok(None)
#[tokio::test]
async fn returns_none_for_unknown_guild() -> Result<(), DbErr> {
    let test = TestBuilder::new()
        .with_table(entity::prelude::Server)
        .build()
        .await
        .unwrap();
    let db = test.db.as_ref().unwrap();

    let repo = ServerRepository::new(db);
    let result = repo.find_by_guild_id(123).await;

    assert!(matches!(result, Ok(None)));

    Ok(())
}

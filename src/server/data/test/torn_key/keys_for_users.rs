use super::*;

/// Tests collecting the keys of a set of admins.
///
/// Expected: Ok with keys of the listed users only
#[tokio::test]
async fn returns_keys_of_listed_users() -> Result<(), DbErr> {
    let test = TestBuilder::new()
        .with_table(entity::prelude::Faction)
        .with_table(entity::prelude::User)
        .with_table(entity::prelude::TornKey)
        .build()
        .await
        .unwrap();
    let db = test.db.as_ref().unwrap();

    let admin = factory::create_user(db).await?;
    let other = factory::create_user(db).await?;
    let first = factory::create_torn_key(db, admin.tid).await?;
    let second = factory::create_torn_key(db, admin.tid).await?;
    factory::create_torn_key(db, other.tid).await?;

    let repo = TornKeyRepository::new(db);
    let mut keys = repo.keys_for_users(&[admin.tid]).await?;
    keys.sort();

    let mut expected = vec![first.api_key, second.api_key];
    expected.sort();
    assert_eq!(keys, expected);

    Ok(())
}

/// Tests that an empty admin list never hits the database filter.
///
/// Expected: Ok(empty)
#[tokio::test]
async fn returns_empty_for_no_users() -> Result<(), DbErr> {
    let test = TestBuilder::new()
        .with_table(entity::prelude::Faction)
        .with_table(entity::prelude::User)
        .with_table(entity::prelude::TornKey)
        .build()
        .await
        .unwrap();
    let db = test.db.as_ref().unwrap();

    let repo = TornKeyRepository::new(db);

    assert!(repo.keys_for_users(&[]).await?.is_empty());

    Ok(())
}

use super::*;

/// Tests deleting a key and deleting it again.
///
/// Expected: Ok(true) then Ok(false)
#[tokio::test]
async fn deletes_key_once() -> Result<(), DbErr> {
    let test = TestBuilder::new()
        .with_table(entity::prelude::Faction)
        .with_table(entity::prelude::User)
        .with_table(entity::prelude::TornKey)
        .build()
        .await
        .unwrap();
    let db = test.db.as_ref().unwrap();

    let user = factory::create_user(db).await?;
    let key = factory::create_torn_key(db, user.tid).await?;

    let repo = TornKeyRepository::new(db);

    assert!(repo.delete(&key.api_key).await?);
    assert!(!repo.delete(&key.api_key).await?);
    assert!(repo.keys_for_users(&[user.tid]).await?.is_empty());

    Ok(())
}

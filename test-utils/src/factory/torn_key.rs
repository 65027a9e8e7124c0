//! API key factory.

use crate::factory::helpers::next_id;
use sea_orm::{ActiveModelTrait, ActiveValue, DatabaseConnection, DbErr};

/// Creates a unique 16-character API key owned by the given user.
///
/// # Arguments
/// - `db` - Database connection
/// - `user_tid` - Owning user's game id
///
/// # Returns
/// - `Ok(entity::torn_key::Model)` - Created key entity
/// - `Err(DbErr)` - Database error during insert
pub async fn create_torn_key(
    db: &DatabaseConnection,
    user_tid: i64,
) -> Result<entity::torn_key::Model, DbErr> {
    entity::torn_key::ActiveModel {
        api_key: ActiveValue::Set(format!("key{:013}", next_id())),
        user_tid: ActiveValue::Set(user_tid),
    }
    .insert(db)
    .await
}

//! Guild member factory for the internal verified-member list.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ActiveValue, DatabaseConnection, DbErr};

/// Records a Discord user as a verified member of a guild.
///
/// # Arguments
/// - `db` - Database connection
/// - `guild_id` - Guild the member belongs to
/// - `user_id` - Discord user id
///
/// # Returns
/// - `Ok(entity::guild_member::Model)` - Created membership row
/// - `Err(DbErr)` - Database error during insert
pub async fn create_guild_member(
    db: &DatabaseConnection,
    guild_id: i64,
    user_id: i64,
) -> Result<entity::guild_member::Model, DbErr> {
    entity::guild_member::ActiveModel {
        guild_id: ActiveValue::Set(guild_id),
        user_id: ActiveValue::Set(user_id),
        verified_at: ActiveValue::Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
}

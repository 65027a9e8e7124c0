//! Internal verified-member list repository.
//!
//! Ids are always returned in ascending order: the verification merge-diff walks these
//! lists alongside the remote member pages.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect,
};

pub struct GuildMemberRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> GuildMemberRepository<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    /// Returns member ids in `(after, up_to]`, ascending.
    ///
    /// # Arguments
    /// - `guild_id` - Discord guild ID
    /// - `after` - Exclusive lower bound (the previous page's cursor)
    /// - `up_to` - Inclusive upper bound (the highest id on the current page)
    ///
    /// # Returns
    /// - `Ok(Vec<i64>)` - Ascending user ids
    /// - `Err(DbErr)` - Database error during query
    pub async fn user_ids_in_range(
        &self,
        guild_id: i64,
        after: i64,
        up_to: i64,
    ) -> Result<Vec<i64>, DbErr> {
        entity::prelude::GuildMember::find()
            .select_only()
            .column(entity::guild_member::Column::UserId)
            .filter(entity::guild_member::Column::GuildId.eq(guild_id))
            .filter(entity::guild_member::Column::UserId.gt(after))
            .filter(entity::guild_member::Column::UserId.lte(up_to))
            .order_by_asc(entity::guild_member::Column::UserId)
            .into_tuple()
            .all(self.db)
            .await
    }

    /// Returns every member id strictly above `after`, ascending.
    pub async fn user_ids_after(&self, guild_id: i64, after: i64) -> Result<Vec<i64>, DbErr> {
        self.user_ids_in_range(guild_id, after, i64::MAX).await
    }

    /// Records a member as verified in a guild. Existing rows are left untouched.
    ///
    /// # Returns
    /// - `Ok(true)` - Row inserted
    /// - `Ok(false)` - Member was already recorded
    /// - `Err(DbErr)` - Database error during query or insert
    pub async fn insert(&self, guild_id: i64, user_id: i64) -> Result<bool, DbErr> {
        let existing = entity::prelude::GuildMember::find()
            .filter(entity::guild_member::Column::GuildId.eq(guild_id))
            .filter(entity::guild_member::Column::UserId.eq(user_id))
            .one(self.db)
            .await?;
        if existing.is_some() {
            return Ok(false);
        }

        entity::guild_member::ActiveModel {
            guild_id: ActiveValue::Set(guild_id),
            user_id: ActiveValue::Set(user_id),
            verified_at: ActiveValue::Set(Utc::now()),
            ..Default::default()
        }
        .insert(self.db)
        .await?;

        Ok(true)
    }

    /// Deletes the given members of a guild.
    ///
    /// # Returns
    /// - `Ok(u64)` - Number of rows deleted (0 when `user_ids` is empty)
    /// - `Err(DbErr)` - Database error during delete
    pub async fn delete_many(&self, guild_id: i64, user_ids: &[i64]) -> Result<u64, DbErr> {
        if user_ids.is_empty() {
            return Ok(0);
        }

        let result = entity::prelude::GuildMember::delete_many()
            .filter(entity::guild_member::Column::GuildId.eq(guild_id))
            .filter(entity::guild_member::Column::UserId.is_in(user_ids.iter().copied()))
            .exec(self.db)
            .await?;

        Ok(result.rows_affected)
    }
}

//! API key repository.

use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder};

/// Repository providing access to stored game-API keys.
pub struct TornKeyRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> TornKeyRepository<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    /// Returns the API keys owned by any of the given users.
    ///
    /// # Arguments
    /// - `user_tids` - Game ids of the key owners
    ///
    /// # Returns
    /// - `Ok(Vec<String>)` - Keys ordered by owner (empty when `user_tids` is empty)
    /// - `Err(DbErr)` - Database error during query
    pub async fn keys_for_users(&self, user_tids: &[i64]) -> Result<Vec<String>, DbErr> {
        if user_tids.is_empty() {
            return Ok(Vec::new());
        }

        let keys = entity::prelude::TornKey::find()
            .filter(entity::torn_key::Column::UserTid.is_in(user_tids.iter().copied()))
            .order_by_asc(entity::torn_key::Column::UserTid)
            .all(self.db)
            .await?;

        Ok(keys.into_iter().map(|k| k.api_key).collect())
    }

    /// Deletes a key the game API reported as unusable.
    ///
    /// # Returns
    /// - `Ok(true)` - Key deleted
    /// - `Ok(false)` - Key was not stored
    /// - `Err(DbErr)` - Database error during delete
    pub async fn delete(&self, api_key: &str) -> Result<bool, DbErr> {
        let result = entity::prelude::TornKey::delete_by_id(api_key.to_string())
            .exec(self.db)
            .await?;

        Ok(result.rows_affected > 0)
    }
}

//! Guild configuration repository.

use sea_orm::{
    sea_query::Expr, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QuerySelect,
};

use crate::server::{error::AppError, model::server::Server};

/// Repository providing database operations for guild verification configuration.
pub struct ServerRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> ServerRepository<'a> {
    /// Creates a new ServerRepository instance.
    ///
    /// # Arguments
    /// - `db` - Reference to the database connection
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    /// Finds a guild's configuration.
    ///
    /// # Arguments
    /// - `guild_id` - Discord guild ID
    ///
    /// # Returns
    /// - `Ok(Some(Server))` - Guild found and its JSON columns decoded
    /// - `Ok(None)` - Guild not configured
    /// - `Err(AppError::DbErr)` - Database error during query
    /// - `Err(AppError::SerdeErr)` - Stored configuration is malformed
    pub async fn find_by_guild_id(&self, guild_id: i64) -> Result<Option<Server>, AppError> {
        let entity = entity::prelude::Server::find_by_id(guild_id)
            .one(self.db)
            .await?;

        entity.map(Server::from_entity).transpose()
    }

    /// Lists the guilds that opted into scheduled verification.
    ///
    /// # Returns
    /// - `Ok(Vec<i64>)` - Guild ids with both verification and auto-verification enabled
    /// - `Err(DbErr)` - Database error during query
    pub async fn auto_verify_guild_ids(&self) -> Result<Vec<i64>, DbErr> {
        entity::prelude::Server::find()
            .select_only()
            .column(entity::server::Column::GuildId)
            .filter(entity::server::Column::VerifyEnabled.eq(true))
            .filter(entity::server::Column::AutoVerifyEnabled.eq(true))
            .into_tuple()
            .all(self.db)
            .await
    }

    /// Removes a channel from every guild configuration referencing it.
    ///
    /// Used when the chat platform reports the channel as unknown or inaccessible, so
    /// later runs stop posting to it.
    ///
    /// # Arguments
    /// - `channel_id` - Discord channel ID
    ///
    /// # Returns
    /// - `Ok(u64)` - Number of configuration columns cleared
    /// - `Err(DbErr)` - Database error during update
    pub async fn clear_channel(&self, channel_id: i64) -> Result<u64, DbErr> {
        let log = entity::prelude::Server::update_many()
            .col_expr(entity::server::Column::VerifyLogChannel, Expr::value(0i64))
            .filter(entity::server::Column::VerifyLogChannel.eq(channel_id))
            .exec(self.db)
            .await?;
        let jail = entity::prelude::Server::update_many()
            .col_expr(entity::server::Column::VerifyJailChannel, Expr::value(0i64))
            .filter(entity::server::Column::VerifyJailChannel.eq(channel_id))
            .exec(self.db)
            .await?;

        Ok(log.rows_affected + jail.rows_affected)
    }
}

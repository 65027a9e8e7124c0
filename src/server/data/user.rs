//! User profile repository.
//!
//! Profiles span three tables: the user row, its faction, and the faction position the
//! user holds. The repository assembles them into a single `Profile`.

use chrono::Utc;
use sea_orm::{
    sea_query::OnConflict, ActiveValue, ColumnTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter,
};

use crate::server::model::profile::{FactionMembership, Profile, UpsertProfileParam};

pub struct UserRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> UserRepository<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    /// Finds the profile linked to a Discord account.
    ///
    /// # Arguments
    /// - `discord_id` - Discord user ID
    ///
    /// # Returns
    /// - `Ok(Some(Profile))` - Linked profile with faction and position resolved
    /// - `Ok(None)` - No game account is linked to this Discord account
    /// - `Err(DbErr)` - Database error during query
    pub async fn find_by_discord_id(&self, discord_id: i64) -> Result<Option<Profile>, DbErr> {
        let Some(user) = entity::prelude::User::find()
            .filter(entity::user::Column::DiscordId.eq(discord_id))
            .one(self.db)
            .await?
        else {
            return Ok(None);
        };

        self.assemble(user).await.map(Some)
    }

    /// Inserts or refreshes a profile from a successful lookup.
    ///
    /// The faction row is upserted first so the user's faction reference is valid, and
    /// `last_refresh` is set to now.
    ///
    /// # Arguments
    /// - `param` - Profile fields from the game API
    ///
    /// # Returns
    /// - `Ok(Profile)` - The stored profile
    /// - `Err(DbErr)` - Database error during upsert
    pub async fn upsert_profile(&self, param: UpsertProfileParam) -> Result<Profile, DbErr> {
        if let Some((faction_id, name, tag)) = &param.faction {
            entity::prelude::Faction::insert(entity::faction::ActiveModel {
                tid: ActiveValue::Set(*faction_id),
                name: ActiveValue::Set(name.clone()),
                tag: ActiveValue::Set(tag.clone()),
            })
            .on_conflict(
                OnConflict::column(entity::faction::Column::Tid)
                    .update_columns([entity::faction::Column::Name, entity::faction::Column::Tag])
                    .to_owned(),
            )
            .exec(self.db)
            .await?;
        }

        entity::prelude::User::insert(entity::user::ActiveModel {
            tid: ActiveValue::Set(param.tid),
            name: ActiveValue::Set(param.name),
            discord_id: ActiveValue::Set(param.discord_id),
            faction_id: ActiveValue::Set(param.faction.as_ref().map(|(id, _, _)| *id)),
            faction_position: ActiveValue::Set(param.position),
            last_refresh: ActiveValue::Set(Utc::now()),
        })
        .on_conflict(
            OnConflict::column(entity::user::Column::Tid)
                .update_columns([
                    entity::user::Column::Name,
                    entity::user::Column::DiscordId,
                    entity::user::Column::FactionId,
                    entity::user::Column::FactionPosition,
                    entity::user::Column::LastRefresh,
                ])
                .to_owned(),
        )
        .exec(self.db)
        .await?;

        let user = entity::prelude::User::find_by_id(param.tid)
            .one(self.db)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(format!("user {}", param.tid)))?;

        self.assemble(user).await
    }

    async fn assemble(&self, user: entity::user::Model) -> Result<Profile, DbErr> {
        let faction = match user.faction_id {
            Some(faction_id) => {
                let tag = entity::prelude::Faction::find_by_id(faction_id)
                    .one(self.db)
                    .await?
                    .map(|f| f.tag)
                    .unwrap_or_default();
                let position_id = match &user.faction_position {
                    Some(position) => entity::prelude::FactionPosition::find()
                        .filter(entity::faction_position::Column::FactionTid.eq(faction_id))
                        .filter(entity::faction_position::Column::Name.eq(position.as_str()))
                        .one(self.db)
                        .await?
                        .map(|p| p.pid),
                    None => None,
                };

                Some(FactionMembership {
                    faction_id,
                    tag,
                    position: user.faction_position.clone(),
                    position_id,
                })
            }
            None => None,
        };

        Ok(Profile {
            tid: user.tid,
            name: user.name,
            discord_id: user.discord_id,
            faction,
            last_refresh: user.last_refresh,
        })
    }
}

use sea_orm_migration::{prelude::*, schema::*};

use super::m20260301_000002_create_faction_table::Faction;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(User::Table)
                    .if_not_exists()
                    .col(big_integer(User::Tid).primary_key())
                    .col(string(User::Name))
                    .col(big_integer(User::DiscordId).default(0))
                    .col(big_integer_null(User::FactionId))
                    .col(string_null(User::FactionPosition))
                    .col(timestamp_with_time_zone(User::LastRefresh))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_faction_id")
                            .from(User::Table, User::FactionId)
                            .to(Faction::Table, Faction::Tid)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_user_discord_id")
                    .table(User::Table)
                    .col(User::DiscordId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(User::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum User {
    Table,
    Tid,
    Name,
    DiscordId,
    FactionId,
    FactionPosition,
    LastRefresh,
}

use sea_orm_migration::{prelude::*, schema::*};

use super::m20260301_000001_create_server_table::Server;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(GuildMember::Table)
                    .if_not_exists()
                    .col(pk_auto(GuildMember::Id))
                    .col(big_integer(GuildMember::GuildId))
                    .col(big_integer(GuildMember::UserId))
                    .col(timestamp_with_time_zone(GuildMember::VerifiedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_guild_member_guild_id")
                            .from(GuildMember::Table, GuildMember::GuildId)
                            .to(Server::Table, Server::GuildId)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .index(
                        Index::create()
                            .unique()
                            .name("idx_guild_member_unique")
                            .col(GuildMember::GuildId)
                            .col(GuildMember::UserId),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(GuildMember::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum GuildMember {
    Table,
    Id,
    GuildId,
    UserId,
    VerifiedAt,
}

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
                    .table(FactionPosition::Table)
                    .if_not_exists()
                    .col(string(FactionPosition::Pid).primary_key())
                    .col(big_integer(FactionPosition::FactionTid))
                    .col(string(FactionPosition::Name))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_faction_position_faction_tid")
                            .from(FactionPosition::Table, FactionPosition::FactionTid)
                            .to(Faction::Table, Faction::Tid)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .index(
                        Index::create()
                            .unique()
                            .name("idx_faction_position_name_unique")
                            .col(FactionPosition::FactionTid)
                            .col(FactionPosition::Name),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(FactionPosition::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum FactionPosition {
    Table,
    Pid,
    FactionTid,
    Name,
}

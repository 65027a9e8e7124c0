use sea_orm_migration::{prelude::*, schema::*};

use super::m20260301_000004_create_user_table::User;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TornKey::Table)
                    .if_not_exists()
                    .col(string(TornKey::ApiKey).primary_key())
                    .col(big_integer(TornKey::UserTid))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_torn_key_user_tid")
                            .from(TornKey::Table, TornKey::UserTid)
                            .to(User::Table, User::Tid)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TornKey::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum TornKey {
    Table,
    ApiKey,
    UserTid,
}

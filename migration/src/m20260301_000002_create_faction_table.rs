use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Faction::Table)
                    .if_not_exists()
                    .col(big_integer(Faction::Tid).primary_key())
                    .col(string(Faction::Name))
                    .col(string(Faction::Tag).default(""))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Faction::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Faction {
    Table,
    Tid,
    Name,
    Tag,
}

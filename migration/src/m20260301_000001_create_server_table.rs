use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Server::Table)
                    .if_not_exists()
                    .col(big_integer(Server::GuildId).primary_key())
                    .col(string(Server::Name))
                    .col(text(Server::Admins).default("[]"))
                    .col(boolean(Server::VerifyEnabled).default(false))
                    .col(boolean(Server::AutoVerifyEnabled).default(false))
                    .col(boolean(Server::GatewayVerifyEnabled).default(false))
                    .col(string(Server::VerifyTemplate).default("{{ name }} [{{ tid }}]"))
                    .col(text(Server::VerifiedRoles).default("[]"))
                    .col(text(Server::ExclusionRoles).default("[]"))
                    .col(text(Server::FactionVerify).default("{}"))
                    .col(big_integer(Server::VerifyLogChannel).default(0))
                    .col(big_integer(Server::VerifyJailChannel).default(0))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Server::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Server {
    Table,
    GuildId,
    Name,
    Admins,
    VerifyEnabled,
    AutoVerifyEnabled,
    GatewayVerifyEnabled,
    VerifyTemplate,
    VerifiedRoles,
    ExclusionRoles,
    FactionVerify,
    VerifyLogChannel,
    VerifyJailChannel,
}

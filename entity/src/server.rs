use sea_orm::entity::prelude::*;

/// Discord guild and its verification configuration.
///
/// The list-valued columns (`admins`, `verified_roles`, `exclusion_roles`,
/// `faction_verify`) hold JSON text and are decoded at the repository boundary.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "server")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub guild_id: i64,
    pub name: String,
    pub admins: String,
    pub verify_enabled: bool,
    pub auto_verify_enabled: bool,
    pub gateway_verify_enabled: bool,
    pub verify_template: String,
    pub verified_roles: String,
    pub exclusion_roles: String,
    pub faction_verify: String,
    pub verify_log_channel: i64,
    pub verify_jail_channel: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::guild_member::Entity")]
    GuildMember,
}

impl Related<super::guild_member::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::GuildMember.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

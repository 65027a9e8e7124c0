use sea_orm::entity::prelude::*;

/// Game account, optionally linked to a Discord account.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "user")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub tid: i64,
    pub name: String,
    /// Linked Discord user id, 0 when unlinked.
    #[sea_orm(indexed)]
    pub discord_id: i64,
    pub faction_id: Option<i64>,
    pub faction_position: Option<String>,
    pub last_refresh: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::faction::Entity",
        from = "Column::FactionId",
        to = "super::faction::Column::Tid"
    )]
    Faction,
    #[sea_orm(has_many = "super::torn_key::Entity")]
    TornKey,
}

impl Related<super::faction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Faction.def()
    }
}

impl Related<super::torn_key::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TornKey.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

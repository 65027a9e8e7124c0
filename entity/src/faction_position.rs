use sea_orm::entity::prelude::*;

/// Named position inside a faction; `pid` is the key used by per-position
/// verification roles.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "faction_position")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub pid: String,
    pub faction_tid: i64,
    pub name: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::faction::Entity",
        from = "Column::FactionTid",
        to = "super::faction::Column::Tid"
    )]
    Faction,
}

impl Related<super::faction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Faction.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

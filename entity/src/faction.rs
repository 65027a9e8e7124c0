use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "faction")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub tid: i64,
    pub name: String,
    pub tag: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::user::Entity")]
    User,
    #[sea_orm(has_many = "super::faction_position::Entity")]
    FactionPosition,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::faction_position::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FactionPosition.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

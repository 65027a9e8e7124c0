//! Faction and faction position factories.

use crate::factory::helpers::next_id;
use sea_orm::{ActiveModelTrait, ActiveValue, DatabaseConnection, DbErr};

/// Creates a faction named `"Faction {id}"` with tag `"F{id}"`.
///
/// # Arguments
/// - `db` - Database connection
///
/// # Returns
/// - `Ok(entity::faction::Model)` - Created faction entity
/// - `Err(DbErr)` - Database error during insert
pub async fn create_faction(db: &DatabaseConnection) -> Result<entity::faction::Model, DbErr> {
    let id = next_id();
    entity::faction::ActiveModel {
        tid: ActiveValue::Set(50_000 + id as i64),
        name: ActiveValue::Set(format!("Faction {}", id)),
        tag: ActiveValue::Set(format!("F{}", id)),
    }
    .insert(db)
    .await
}

/// Creates a named position inside a faction.
///
/// # Arguments
/// - `db` - Database connection
/// - `faction_tid` - Owning faction id
/// - `name` - Position name as reported by the game API
///
/// # Returns
/// - `Ok(entity::faction_position::Model)` - Created position entity
/// - `Err(DbErr)` - Database error during insert
pub async fn create_faction_position(
    db: &DatabaseConnection,
    faction_tid: i64,
    name: impl Into<String>,
) -> Result<entity::faction_position::Model, DbErr> {
    entity::faction_position::ActiveModel {
        pid: ActiveValue::Set(format!("pos-{}", next_id())),
        faction_tid: ActiveValue::Set(faction_tid),
        name: ActiveValue::Set(name.into()),
    }
    .insert(db)
    .await
}

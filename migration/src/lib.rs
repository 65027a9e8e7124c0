pub use sea_orm_migration::prelude::*;

mod m20260301_000001_create_server_table;
mod m20260301_000002_create_faction_table;
mod m20260301_000003_create_faction_position_table;
mod m20260301_000004_create_user_table;
mod m20260301_000005_create_torn_key_table;
mod m20260301_000006_create_guild_member_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260301_000001_create_server_table::Migration),
            Box::new(m20260301_000002_create_faction_table::Migration),
            Box::new(m20260301_000003_create_faction_position_table::Migration),
            Box::new(m20260301_000004_create_user_table::Migration),
            Box::new(m20260301_000005_create_torn_key_table::Migration),
            Box::new(m20260301_000006_create_guild_member_table::Migration),
        ]
    }
}

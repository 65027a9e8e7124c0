//! SeaORM entity models for the tornsync database.

pub mod prelude;

pub mod faction;
pub mod faction_position;
pub mod guild_member;
pub mod server;
pub mod torn_key;
pub mod user;

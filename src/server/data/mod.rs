//! Database repository layer.
//!
//! Repositories use SeaORM entity models internally and return domain models, keeping
//! entity rows out of the service and verification layers.

pub mod guild_member;
pub mod server;
pub mod torn_key;
pub mod user;

#[cfg(test)]
mod test;

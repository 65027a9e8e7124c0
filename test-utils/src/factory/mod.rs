//! Factory methods for creating test data.
//!
//! Each entity has its own factory module with a `Factory` builder for customization and a
//! `create_*` convenience function for quick default creation.
//!
//! ```rust,ignore
//! use test_utils::factory;
//!
//! let server = factory::create_server(&db).await?;
//! let user = factory::user::UserFactory::new(&db)
//!     .discord_id(123456789)
//!     .faction_id(Some(faction.tid))
//!     .build()
//!     .await?;
//! factory::create_guild_member(&db, server.guild_id, user.discord_id).await?;
//! ```
//!
//! # Available Factories
//!
//! - `server` - Guild configuration rows
//! - `faction` - Factions and faction positions
//! - `user` - Game accounts linked to Discord accounts
//! - `torn_key` - API keys owned by users
//! - `guild_member` - Previously verified members of a guild
//! - `helpers` - Id generation

pub mod faction;
pub mod guild_member;
pub mod helpers;
pub mod server;
pub mod torn_key;
pub mod user;

pub use faction::{create_faction, create_faction_position};
pub use guild_member::create_guild_member;
pub use server::create_server;
pub use torn_key::create_torn_key;
pub use user::create_user;

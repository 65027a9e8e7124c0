pub use super::faction::Entity as Faction;
pub use super::faction_position::Entity as FactionPosition;
pub use super::guild_member::Entity as GuildMember;
pub use super::server::Entity as Server;
pub use super::torn_key::Entity as TornKey;
pub use super::user::Entity as User;

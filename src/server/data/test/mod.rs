mod guild_member;
mod server;
mod torn_key;
mod user;

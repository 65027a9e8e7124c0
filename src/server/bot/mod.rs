//! Discord bot integration for member join and leave events.
//!
//! Scheduled verification runs catch drift eventually, but members who join should be
//! verified right away and members who leave should stop counting toward the internal
//! member list. The bot listens for both events and feeds the task queue; it makes no
//! REST calls of its own, so every outgoing request still goes through the gateway.
//!
//! # Gateway Intents
//!
//! The bot requires the following gateway intents:
//! - `GUILDS` - Receive guild availability events
//! - `GUILD_MEMBERS` - Receive member join and leave events (privileged intent)
//!
//! Note: `GUILD_MEMBERS` is a privileged intent and must be explicitly enabled
//! in the Discord Developer Portal for the bot application.

pub mod handler;
pub mod start;

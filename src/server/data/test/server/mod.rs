use crate::server::data::server::ServerRepository;
use sea_orm::DbErr;
use test_utils::{builder::TestBuilder, factory};

mod auto_verify_guild_ids;
mod clear_channel;
mod find_by_guild_id;

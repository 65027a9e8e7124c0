use crate::server::data::guild_member::GuildMemberRepository;
use sea_orm::DbErr;
use test_utils::{builder::TestBuilder, factory};

mod delete_many;
mod insert;
mod user_ids_in_range;

use crate::server::{data::user::UserRepository, model::profile::UpsertProfileParam};
use sea_orm::DbErr;
use test_utils::{builder::TestBuilder, factory};

mod find_by_discord_id;
mod upsert_profile;

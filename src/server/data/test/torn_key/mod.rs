use crate::server::data::torn_key::TornKeyRepository;
use sea_orm::DbErr;
use test_utils::{builder::TestBuilder, factory};

mod delete;
mod keys_for_users;

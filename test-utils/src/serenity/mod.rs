//! Test factories for creating Serenity API objects.
//!
//! These factories build valid Serenity structs by deserializing JSON, simulating what
//! Discord's gateway would deliver.
//!
//! # Available Factories
//!
//! - `member::create_test_member` - Create Serenity Member objects

pub mod member;

pub use member::create_test_member;

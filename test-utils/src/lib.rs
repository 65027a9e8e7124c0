//! Tornsync Test Utils
//!
//! Shared testing utilities for the tornsync gateway and verification engine. This crate
//! offers a builder for creating test contexts backed by in-memory SQLite databases, entity
//! factories and Serenity object fixtures.
//!
//! # Overview
//!
//! - **TestBuilder**: Fluent builder for configuring test environments
//! - **TestContext**: Test environment containing the database connection
//! - **TestError**: Error types that can occur during test setup
//!
//! # Usage
//!
//! ```rust,ignore
//! use test_utils::builder::TestBuilder;
//! use entity::prelude::Server;
//!
//! #[tokio::test]
//! async fn test_server_operations() -> Result<(), TestError> {
//!     let test = TestBuilder::new()
//!         .with_table(Server)
//!         .build()
//!         .await?;
//!
//!     let db = test.db.unwrap();
//!     // Perform database operations...
//!
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod context;
pub mod error;
pub mod factory;
pub mod serenity;

//! Outbound API gateway and guild verification sync engine.
//!
//! Every call to Discord or the Torn API goes through the gateway, which enforces the
//! remote rate limits across all worker processes using a shared key-value store. Work
//! is expressed as tasks on a shared queue; workers execute them and the retry
//! orchestrator decides whether a failed task is rescheduled, dropped or handed to
//! error follow-up.
//!
//! # Architecture
//!
//! - **Gateway** (`gateway/`) - Route normalization, bucket registry and the call primitive
//! - **Store** (`store/`) - Shared key-value store trait with Redis and in-process backends
//! - **Task** (`task/`) - Task queue, worker loop and retry orchestration
//! - **Verify** (`verify/`) - Paginated guild verification runs and single-member verification
//! - **Service Layer** (`service/`) - Profile lookups and remote error follow-up
//! - **Data Layer** (`data/`) - Database operations and entity-to-domain model conversion
//! - **Model Layer** (`model/`) - Domain models
//! - **Error Layer** (`error/`) - Application error types
//!
//! # Infrastructure
//!
//! - **Configuration** (`config`) - Environment-based application configuration
//! - **State** (`state`) - Shared application state (DB, store, gateway, queue)
//! - **Startup** (`startup`) - Initialization of database, store, HTTP client and logging
//! - **Scheduler** (`scheduler/`) - Cron job queueing the verification fan-out
//! - **Bot** (`bot/`) - Member join and leave events

pub mod bot;
pub mod config;
pub mod data;
pub mod error;
pub mod gateway;
pub mod model;
pub mod scheduler;
pub mod service;
pub mod startup;
pub mod state;
pub mod store;
pub mod task;
pub mod verify;

//! Kapok Database: SurrealDB connection management, control-table
//! migrations, repository implementations and storage administration.
//!
//! This crate provides:
//! - Connection management ([`DbManager`], [`DbConfig`])
//! - Schema initialization and migrations ([`run_migrations`])
//! - Implementations of every `kapok-core` repository trait
//! - Schema and database DDL ([`SurrealAdmin`], [`SurrealConnection`])
//! - Error types ([`DbError`])

mod admin;
mod connection;
mod error;
pub mod repository;
mod schema;

pub use admin::{SurrealAdmin, SurrealConnection};
pub use connection::{DbConfig, DbManager};
pub use error::DbError;
pub use schema::{latest_version, run_migrations};

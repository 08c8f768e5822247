//! # catalog-sqlite-conn-mgr
//!
//! A small wrapper around SQLx that gives the catalog search engine a
//! pooled SQLite database.
//!
//! ## Core Types
//!
//! - **[`SqliteDatabase`]**: Database with separate read and write connection pools
//! - **[`SqliteDatabaseConfig`]**: Configuration for connection pool settings
//! - **[`WriteGuard`]**: RAII guard ensuring exclusive write access
//! - **[`Error`]**: Error type for database operations
//!
//! ## Architecture
//!
//! - **Dual pools**: Separate read-only pool (max 6 connections) and write pool (max 1 connection)
//! - **Lazy WAL mode**: Write-Ahead Logging enabled automatically on first write
//! - **Exclusive writes**: Single-connection write pool enforces serialized write access
//! - **Unicode case folding**: `casefold(x)` is available on every connection
//! - **Concurrent reads**: Search requests query simultaneously via the read pool

mod casefold;
mod config;
mod database;
mod error;
mod write_guard;

// Re-export public types
pub use casefold::CASEFOLD_FUNCTION;
pub use config::SqliteDatabaseConfig;
pub use database::SqliteDatabase;
pub use error::{Error, Result};
pub use write_guard::WriteGuard;

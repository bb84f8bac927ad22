//! Database Layer
//!
//! This module handles all interactions with the page store:
//!
//! - Database initialization and connection management (libsql, WAL)
//! - Nested-set arithmetic for inserting and moving pages
//! - Domain events emitted after committed mutations
//!
//! # Architecture
//!
//! The store is an embedded SQLite-compatible database. Queries are plain
//! parameterized SQL; multi-statement mutations run inside explicit
//! `BEGIN IMMEDIATE` transactions on a single connection.

pub mod database;
mod error;
pub mod events;
pub mod nested_set;

pub use database::{
    commit, nullable_int, nullable_text, query_ids_on, query_scalar_on, rollback,
    DatabaseService, DEFAULT_BUSY_TIMEOUT_MS,
};
pub use error::DatabaseError;
pub use events::PageEvent;
pub use nested_set::{MoveTarget, NestedSetError, NestedSetHelper, TreePosition};

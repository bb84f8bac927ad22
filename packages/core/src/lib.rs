//! PageSpace Core Page Repository
//!
//! This crate stores the page tree of a content-managed site and the typed
//! content of each page.
//!
//! # Architecture
//!
//! - **Nested set**: pages carry `left`/`right`/`depth` coordinates, so
//!   subtree, parent and slug lookups are single queries without recursion
//! - **Schema-driven content**: a page type registers fields and
//!   (repeatable) groups; stored content is flat rows bound onto that schema
//! - **libsql**: embedded SQLite-compatible database
//! - **Events**: committed writes are broadcast as `PageEvent`s
//!
//! # Modules
//!
//! - [`models`] - Data structures (Page, Field, Group, Content, PageType)
//! - [`services`] - PageLoader, PageWriter, ContentLoader and collaborators
//! - [`db`] - Database layer with libsql integration and nested-set moves
//! - [`engine`] - One handle wiring everything together
//! - [`config`] / [`telemetry`] - Engine settings and logging setup

pub mod config;
pub mod db;
pub mod engine;
pub mod models;
pub mod services;
pub mod telemetry;

// Re-export commonly used types
pub use config::{ConfigError, EngineConfig};
pub use engine::{EngineCollaborators, EngineError, PageEngine};
pub use models::*;
pub use services::*;

//! Page Store Errors
//!
//! Failures of the libsql page store itself: opening the database file,
//! creating the page/content tables and running statements. Whether a
//! page exists or a move is legal is decided above this layer, in
//! `services::error`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Cannot open page store at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        source: libsql::Error,
    },

    /// The directory holding the store file is not writable
    #[error("Page store directory is not writable: {path}")]
    StoreNotWritable { path: PathBuf },

    #[error("Cannot create page store directory: {0}")]
    StoreDirectory(#[from] std::io::Error),

    /// Creating the page, slug history, access group, tag or content tables failed
    #[error("Cannot prepare page store tables: {0}")]
    Schema(String),

    #[error(transparent)]
    Libsql(#[from] libsql::Error),

    /// A page store statement failed; `context` names the statement
    #[error("Page store query failed: {context}")]
    Query { context: String },
}

impl DatabaseError {
    pub fn open_failed(path: PathBuf, source: libsql::Error) -> Self {
        Self::OpenFailed { path, source }
    }

    pub fn store_not_writable(path: PathBuf) -> Self {
        Self::StoreNotWritable { path }
    }

    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    pub fn query_failed(context: impl Into<String>) -> Self {
        Self::Query {
            context: context.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_error_names_statement() {
        let err = DatabaseError::query_failed("Failed to load pages: no such table: page");
        assert_eq!(
            err.to_string(),
            "Page store query failed: Failed to load pages: no such table: page"
        );
    }
}

//! Service Layer Error Types
//!
//! This module defines error types for page service operations. Lookups
//! never fail with "not found": singular lookups return `Option`, plural
//! lookups an empty collection. `PageNotFound` is only raised by operations
//! that require an existing page, such as moves.

use crate::db::{DatabaseError, NestedSetError};
use crate::models::FieldError;
use thiserror::Error;

/// Page service errors
#[derive(Error, Debug)]
pub enum PageServiceError {
    /// Database operation failed
    #[error("Database operation failed: {0}")]
    Database(#[from] DatabaseError),

    /// A page type's schema could not be built
    #[error("Invalid field configuration: {0}")]
    Field(#[from] FieldError),

    /// A stored page references a page type that is not registered
    #[error("Page {page_id} has unknown page type `{page_type}`")]
    UnknownPageType { page_id: i64, page_type: String },

    /// Page required by the operation does not exist
    #[error("Page not found: {id}")]
    PageNotFound { id: i64 },

    /// Requested tree move is not possible
    #[error("Invalid move: {0}")]
    InvalidMove(String),

    /// Transaction failed and was rolled back
    #[error("Transaction failed: {context}")]
    TransactionFailed { context: String },

    /// The search collaborator failed
    #[error("Search failed: {0}")]
    Search(String),

    /// A slug could not be used
    #[error("Invalid slug `{slug}`: {reason}")]
    InvalidSlug { slug: String, reason: String },

    /// Query execution error
    #[error("Query failed: {0}")]
    Query(String),
}

impl PageServiceError {
    pub fn unknown_page_type(page_id: i64, page_type: impl Into<String>) -> Self {
        Self::UnknownPageType {
            page_id,
            page_type: page_type.into(),
        }
    }

    pub fn page_not_found(id: i64) -> Self {
        Self::PageNotFound { id }
    }

    pub fn invalid_move(msg: impl Into<String>) -> Self {
        Self::InvalidMove(msg.into())
    }

    /// Create a transaction failed error
    pub fn transaction_failed(context: impl Into<String>) -> Self {
        Self::TransactionFailed {
            context: context.into(),
        }
    }

    pub fn search(msg: impl Into<String>) -> Self {
        Self::Search(msg.into())
    }

    pub fn invalid_slug(slug: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSlug {
            slug: slug.into(),
            reason: reason.into(),
        }
    }

    /// Create a query failed error
    pub fn query_failed(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }
}

impl From<NestedSetError> for PageServiceError {
    fn from(err: NestedSetError) -> Self {
        match err {
            NestedSetError::PageNotFound(id) => Self::page_not_found(id),
            err @ NestedSetError::IntoOwnSubtree { .. } => Self::invalid_move(err.to_string()),
            NestedSetError::Database(e) => Self::transaction_failed(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_set_errors_map_to_typed_reasons() {
        assert!(matches!(
            PageServiceError::from(NestedSetError::PageNotFound(3)),
            PageServiceError::PageNotFound { id: 3 }
        ));
        assert!(matches!(
            PageServiceError::from(NestedSetError::IntoOwnSubtree { page: 1, target: 2 }),
            PageServiceError::InvalidMove(_)
        ));
        assert!(matches!(
            PageServiceError::from(NestedSetError::Database(DatabaseError::query_failed("boom"))),
            PageServiceError::TransactionFailed { .. }
        ));
    }
}

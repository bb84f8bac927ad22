//! Business Services
//!
//! This module contains the page engine's services:
//!
//! - `PageLoader` - nested-set lookups by id, slug, tree relation, type, tag
//!   and search terms
//! - `PageWriter` - create, edit, move, publish and delete pages
//! - `ContentLoader` - build and populate a page's typed content
//! - `FieldFactory` - build a page type's field schema
//! - `CommentContentValidator` - check content can process comments
//!
//! The loader talks to two collaborators through traits: `Authorisation`
//! decides visibility and publication, `Searcher` ranks search matches.

pub mod authorisation;
pub mod comment_validator;
pub mod content_loader;
pub mod error;
pub mod field_factory;
pub mod page_loader;
pub mod page_order;
pub mod page_writer;
pub mod searcher;

pub use authorisation::{
    AccessAuthorisation, Authorisation, ACCESS_ANYONE, ACCESS_GROUPS, ACCESS_GUESTS,
    ACCESS_LOGGED_IN,
};
pub use comment_validator::{CommentContentValidator, InvalidContentError};
pub use content_loader::{content_rows, ContentLoader, ContentRow};
pub use error::PageServiceError;
pub use field_factory::{FieldFactory, FieldGroup};
pub use page_loader::{PageLoader, Pagination, SearchOptions, DEFAULT_SEARCH_MIN_TERM_LENGTH};
pub use page_order::{OrderStatement, PageOrder};
pub use page_writer::{slugify, PageWriter};
pub use searcher::{split_search_terms, ContentSearcher, Searcher};

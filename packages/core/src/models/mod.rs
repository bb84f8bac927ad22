//! Data Models
//!
//! This module contains the core data structures of the page repository:
//!
//! - `Page` - a node in the site tree with its nested-set position
//! - `Field`, `MultipleValueField`, `Group`, `RepeatableContainer` - the
//!   typed value containers a page type's schema is built from
//! - `Content` - the resolved content of one page
//! - `PageType` - named content schemas, registered in a `PageTypeRegistry`

mod content;
mod field;
mod field_types;
mod group;
mod page;
mod page_type;
mod user;
mod validation;

pub use content::{Content, ContentSlot};
pub use field::{
    Field, FieldError, FieldNode, MultipleValueField, RichTextEngine, Rule,
    TRANSLATION_KEY_PREFIX,
};
pub use field_types::{FieldConstructor, FieldTypeRegistry, BUILTIN_FIELD_TYPES};
pub use group::{Group, RepeatableContainer};
pub use page::{
    from_epoch, to_epoch, Authorship, CommentSettings, DateRange, Page, PageCollection, Slug,
    ACCESS_INHERIT,
};
pub use page_type::{
    DefinedPageType, FieldDefinition, PageType, PageTypeDefinition, PageTypeRegistry,
    GROUP_FIELD_TYPE,
};
pub use user::{Actor, GroupCollection, GroupDirectory, UserGroup};
pub use validation::{ContentValidationErrors, ValidationError, Validator};

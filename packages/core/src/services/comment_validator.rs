//! Comment Content Validation
//!
//! Pages that accept comments carry a `comments` content group with two
//! fields: `allow_comments` (`allow`, `approve` or `disabled`) and the
//! multi-value `permission` field listing who may comment.
//! [`CommentContentValidator`] checks that a page's content has that shape
//! before a comment is processed.

use crate::models::{Content, ContentSlot, FieldNode, Group};
use thiserror::Error;

pub const COMMENTS_GROUP: &str = "comments";
pub const ALLOW_COMMENTS_FIELD: &str = "allow_comments";
pub const PERMISSION_FIELD: &str = "permission";

pub const COMMENTS_ALLOW: &str = "allow";
pub const COMMENTS_APPROVE: &str = "approve";
pub const COMMENTS_DISABLED: &str = "disabled";

/// Content cannot be used to process comments
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidContentError {
    #[error("`comments` group not declared on content")]
    MissingGroup,

    #[error("`comments` must be a content group, found {found}")]
    NotAGroup { found: &'static str },

    #[error("Option for `{0}` not defined")]
    MissingField(&'static str),

    #[error("`{field}` must be a {expected} field")]
    WrongFieldKind {
        field: &'static str,
        expected: &'static str,
    },

    #[error("Comments are disabled for this page")]
    CommentsDisabled,

    #[error("Comment setting `{0}` is invalid")]
    InvalidSetting(String),

    #[error("`permission` is not determined")]
    NoPermission,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CommentContentValidator;

impl CommentContentValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn is_valid(&self, content: &Content) -> bool {
        self.validate(content).is_ok()
    }

    pub fn validate(&self, content: &Content) -> Result<(), InvalidContentError> {
        let group = match content.get(COMMENTS_GROUP) {
            None => return Err(InvalidContentError::MissingGroup),
            Some(ContentSlot::Group(group)) => group,
            Some(other) => {
                return Err(InvalidContentError::NotAGroup {
                    found: slot_kind(other),
                })
            }
        };

        validate_enabling_options(group)?;
        validate_access_options(group)
    }
}

fn validate_enabling_options(group: &Group) -> Result<(), InvalidContentError> {
    let field = match group.get(ALLOW_COMMENTS_FIELD) {
        None => return Err(InvalidContentError::MissingField(ALLOW_COMMENTS_FIELD)),
        Some(FieldNode::Field(field)) => field,
        Some(_) => {
            return Err(InvalidContentError::WrongFieldKind {
                field: ALLOW_COMMENTS_FIELD,
                expected: "single-value",
            })
        }
    };

    match field.value().unwrap_or_default() {
        COMMENTS_DISABLED => Err(InvalidContentError::CommentsDisabled),
        COMMENTS_ALLOW | COMMENTS_APPROVE => Ok(()),
        other => Err(InvalidContentError::InvalidSetting(other.to_string())),
    }
}

fn validate_access_options(group: &Group) -> Result<(), InvalidContentError> {
    match group.get(PERMISSION_FIELD) {
        None => Err(InvalidContentError::MissingField(PERMISSION_FIELD)),
        Some(FieldNode::Multiple(permission)) if permission.is_empty() => {
            Err(InvalidContentError::NoPermission)
        }
        Some(FieldNode::Multiple(_)) => Ok(()),
        Some(_) => Err(InvalidContentError::WrongFieldKind {
            field: PERMISSION_FIELD,
            expected: "multi-value",
        }),
    }
}

fn slot_kind(slot: &ContentSlot) -> &'static str {
    match slot {
        ContentSlot::Field(_) => "a field",
        ContentSlot::Multiple(_) => "a multi-value field",
        ContentSlot::Group(_) => "a group",
        ContentSlot::Repeatable(_) => "a repeatable group",
    }
}

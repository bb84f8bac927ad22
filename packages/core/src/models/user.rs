//! Users and Groups
//!
//! The identity directory is external; this module only defines what the
//! page engine needs from it: resolving a group name to a descriptor, and
//! the acting user on whose behalf pages are loaded and written.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;

/// A user group pages can be restricted to
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserGroup {
    pub name: String,
    pub display_name: String,
}

impl UserGroup {
    pub fn new(name: &str, display_name: &str) -> Self {
        Self {
            name: name.to_string(),
            display_name: display_name.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Resolves group names to group descriptors
pub trait GroupDirectory: Debug + Send + Sync {
    fn get(&self, name: &str) -> Option<UserGroup>;
}

/// In-memory group directory
#[derive(Debug, Clone, Default)]
pub struct GroupCollection {
    groups: BTreeMap<String, UserGroup>,
}

impl GroupCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, group: UserGroup) -> &mut Self {
        self.groups.insert(group.name.clone(), group);
        self
    }

    pub fn with(mut self, group: UserGroup) -> Self {
        self.add(group);
        self
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl GroupDirectory for GroupCollection {
    fn get(&self, name: &str) -> Option<UserGroup> {
        self.groups.get(name).cloned()
    }
}

/// The user performing an operation
///
/// `id` is `None` for guests. `unlocked_pages` lists password-protected
/// pages the user has entered the password for during this session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Option<i64>,
    pub groups: BTreeSet<String>,
    pub unlocked_pages: BTreeSet<i64>,
}

impl Actor {
    pub fn guest() -> Self {
        Self::default()
    }

    pub fn user(id: i64) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    pub fn with_group(mut self, group: &str) -> Self {
        self.groups.insert(group.to_string());
        self
    }

    pub fn unlock(&mut self, page_id: i64) {
        self.unlocked_pages.insert(page_id);
    }

    pub fn is_logged_in(&self) -> bool {
        self.id.is_some()
    }

    pub fn is_in_group(&self, group: &str) -> bool {
        self.groups.contains(group)
    }

    pub fn has_unlocked(&self, page_id: i64) -> bool {
        self.unlocked_pages.contains(&page_id)
    }
}

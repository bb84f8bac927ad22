//! Page Authorisation
//!
//! The page loader asks an [`Authorisation`] collaborator whether a page may
//! be shown to the current actor and whether it is currently published.
//! [`AccessAuthorisation`] is the default implementation, driven by the
//! page's resolved access level:
//!
//! | access | who may view                                   |
//! |--------|------------------------------------------------|
//! | 0      | anyone                                         |
//! | 1      | guests only (not logged in)                    |
//! | 2      | logged-in users                                |
//! | 3+     | logged-in members of one of the page's groups  |
//!
//! A page with a password is additionally hidden until the actor has
//! unlocked it.

use crate::models::{Actor, Page};
use chrono::Utc;
use std::fmt::Debug;

pub const ACCESS_ANYONE: i64 = 0;
pub const ACCESS_GUESTS: i64 = 1;
pub const ACCESS_LOGGED_IN: i64 = 2;
pub const ACCESS_GROUPS: i64 = 3;

pub trait Authorisation: Debug + Send + Sync {
    fn is_viewable(&self, page: &Page, actor: &Actor) -> bool;

    fn is_published(&self, page: &Page) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AccessAuthorisation;

impl AccessAuthorisation {
    pub fn new() -> Self {
        Self
    }

    fn has_access(page: &Page, actor: &Actor) -> bool {
        match page.access {
            a if a <= ACCESS_ANYONE => true,
            ACCESS_GUESTS => !actor.is_logged_in(),
            ACCESS_LOGGED_IN => actor.is_logged_in(),
            _ => {
                actor.is_logged_in()
                    && page.access_group_names().any(|group| actor.is_in_group(group))
            }
        }
    }
}

impl Authorisation for AccessAuthorisation {
    fn is_viewable(&self, page: &Page, actor: &Actor) -> bool {
        if !Self::has_access(page, actor) {
            return false;
        }

        match page.password.as_deref() {
            Some(password) if !password.is_empty() => actor.has_unlocked(page.id),
            _ => true,
        }
    }

    fn is_published(&self, page: &Page) -> bool {
        page.is_published_at(Utc::now())
    }
}

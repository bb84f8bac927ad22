//! Page Events
//!
//! Events emitted by the page writer after a mutation has been committed.
//! They are published on a `tokio::sync::broadcast` channel so any number of
//! listeners (cache invalidation, audit logging, search indexing) can observe
//! changes without coupling to the writer.
//!
//! Emission is fire-and-observe: the writer never waits for listeners and a
//! channel without subscribers is not an error.

use crate::models::Page;

/// Domain events emitted by the page writer
#[derive(Debug, Clone)]
pub enum PageEvent {
    /// A new page was created and positioned in the tree
    Created(Page),

    /// A page's scalar fields, metadata or access groups were saved
    Edited(Page),

    Published(Page),

    Unpublished(Page),

    /// A page's slug changed; `old_slug` was archived to the slug history
    SlugChanged { page: Page, old_slug: String },

    /// A page (and its subtree) moved to a new position in the tree
    Moved { page_id: i64 },

    Deleted(Page),

    Restored(Page),

    TagsChanged(Page),

    /// A page's content rows were replaced
    ContentSaved { page_id: i64 },
}

impl PageEvent {
    /// Stable name of the event
    pub fn event_type(&self) -> &'static str {
        match self {
            PageEvent::Created(_) => "cms.page.create",
            PageEvent::Edited(_) => "cms.page.edit",
            PageEvent::Published(_) => "cms.page.publish",
            PageEvent::Unpublished(_) => "cms.page.unpublish",
            PageEvent::SlugChanged { .. } => "cms.page.slug_change",
            PageEvent::Moved { .. } => "cms.page.move",
            PageEvent::Deleted(_) => "cms.page.delete",
            PageEvent::Restored(_) => "cms.page.restore",
            PageEvent::TagsChanged(_) => "cms.page.tags",
            PageEvent::ContentSaved { .. } => "cms.page.content.edit",
        }
    }

    /// Id of the page the event is about
    pub fn page_id(&self) -> i64 {
        match self {
            PageEvent::Created(page)
            | PageEvent::Edited(page)
            | PageEvent::Published(page)
            | PageEvent::Unpublished(page)
            | PageEvent::Deleted(page)
            | PageEvent::Restored(page)
            | PageEvent::TagsChanged(page)
            | PageEvent::SlugChanged { page, .. } => page.id,
            PageEvent::Moved { page_id } | PageEvent::ContentSaved { page_id } => *page_id,
        }
    }
}

//! Page Writer
//!
//! Create and edit operations on pages. Every mutation is written first and
//! then announced on the page event channel; a write that fails emits
//! nothing.
//!
//! Mutations that touch more than one row (positioning, access groups,
//! tags, content) run in a single `BEGIN IMMEDIATE` transaction and are
//! rolled back as a whole on failure.

use crate::db::{
    commit, nullable_int, nullable_text, query_scalar_on, rollback, DatabaseError,
    DatabaseService, MoveTarget, NestedSetHelper, PageEvent, TreePosition,
};
use crate::models::{Actor, Content, DateRange, Page, Slug, ACCESS_INHERIT};
use crate::services::content_loader::{content_rows, ContentRow};
use crate::services::error::PageServiceError;
use crate::services::page_loader::PageLoader;
use chrono::Utc;
use libsql::{Connection, Value};
use regex::Regex;
use std::sync::{Arc, OnceLock};
use tokio::sync::broadcast;

/// Slug segment used when a title has no usable characters
pub const DEFAULT_SLUG: &str = "page";

const SLUG_SEPARATOR_PATTERN: &str = r"[^\p{L}\p{N}]+";
static SLUG_SEPARATOR_REGEX: OnceLock<Regex> = OnceLock::new();

/// Derive a slug segment from a page title
pub fn slugify(title: &str) -> String {
    let separator =
        SLUG_SEPARATOR_REGEX.get_or_init(|| Regex::new(SLUG_SEPARATOR_PATTERN).unwrap());

    let slug = separator
        .replace_all(&title.to_lowercase(), "-")
        .trim_matches('-')
        .to_string();

    if slug.is_empty() {
        DEFAULT_SLUG.to_string()
    } else {
        slug
    }
}

#[derive(Debug, Clone)]
pub struct PageWriter {
    db: Arc<DatabaseService>,
    loader: PageLoader,
    events: broadcast::Sender<PageEvent>,
}

impl PageWriter {
    /// Create a writer acting as the loader's actor
    pub fn new(
        db: Arc<DatabaseService>,
        loader: PageLoader,
        events: broadcast::Sender<PageEvent>,
    ) -> Self {
        Self { db, loader, events }
    }

    pub fn for_actor(mut self, actor: Actor) -> Self {
        self.loader = self.loader.for_actor(actor);
        self
    }

    pub fn actor(&self) -> &Actor {
        self.loader.actor()
    }

    /// Subscribe to events emitted after successful writes
    pub fn subscribe_to_events(&self) -> broadcast::Receiver<PageEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: PageEvent) {
        tracing::debug!(event = event.event_type(), page_id = event.page_id(), "page event");
        // No subscribers is not an error
        let _ = self.events.send(event);
    }

    /// Reload a page regardless of the loader's filters
    async fn reload(&self, id: i64) -> Result<Page, PageServiceError> {
        self.loader
            .unfiltered()
            .get_by_id(id)
            .await?
            .ok_or_else(|| PageServiceError::page_not_found(id))
    }

    /// Full slug a page with `segment` gets as the last child of
    /// `parent_id`, or `None` when it would become the homepage
    async fn new_page_path(
        &self,
        parent_id: Option<i64>,
        segment: &str,
    ) -> Result<Option<Slug>, PageServiceError> {
        let parent_segments = match parent_id {
            Some(parent_id) => self.reload(parent_id).await?.slug.segments().to_vec(),
            None if self.live_pages().get_homepage().await?.is_none() => return Ok(None),
            None => Vec::new(),
        };

        Ok(Some(Slug::new(
            parent_segments.into_iter().chain([segment.to_string()]),
        )))
    }

    /// Fails when `slug` already resolves to a page other than `page_id`
    ///
    /// Children of the homepage share the top-level namespace, so a
    /// homepage child and a top-level page may not take the same segment.
    async fn ensure_slug_free(
        &self,
        slug: &Slug,
        page_id: Option<i64>,
    ) -> Result<(), PageServiceError> {
        let path = slug.full();
        match self.live_pages().get_by_slug(&path, false).await? {
            Some(holder) if Some(holder.id) != page_id => {
                tracing::warn!(slug = %path, holder = holder.id, ?page_id, "slug collision");
                Err(PageServiceError::invalid_slug(
                    path,
                    format!("already used by page {}", holder.id),
                ))
            }
            _ => Ok(()),
        }
    }

    /// The slug segment stored for `page_id`, including the homepage's own
    async fn stored_segment(&self, page_id: i64) -> Result<String, PageServiceError> {
        let conn = self.db.connect_with_timeout().await?;
        let mut rows = conn
            .query(
                "SELECT slug FROM page WHERE page_id = ?",
                vec![Value::Integer(page_id)],
            )
            .await
            .map_err(|e| PageServiceError::query_failed(format!("Failed to load slug: {}", e)))?;

        match rows.next().await.map_err(DatabaseError::from)? {
            Some(row) => Ok(row.get::<String>(0).map_err(DatabaseError::from)?),
            None => Err(PageServiceError::page_not_found(page_id)),
        }
    }

    /// Every page that is not deleted, whatever its publish window or access
    fn live_pages(&self) -> PageLoader {
        self.loader.unfiltered().include_deleted(false)
    }

    //
    // CREATE
    //

    /// Create a page as the last child of `parent_id`, or as the last
    /// top-level page
    ///
    /// The page starts with inherited access and an empty publish window.
    pub async fn create(
        &self,
        page_type: &str,
        title: &str,
        parent_id: Option<i64>,
    ) -> Result<Page, PageServiceError> {
        if !self.loader.page_types().contains(page_type) {
            return Err(PageServiceError::unknown_page_type(0, page_type));
        }

        let segment = slugify(title);
        if let Some(path) = self.new_page_path(parent_id, &segment).await? {
            self.ensure_slug_free(&path, None).await?;
        }

        let conn = self.db.begin_transaction().await?;
        let inserted = self
            .insert_page(&conn, page_type, title, &segment, parent_id)
            .await;
        let id = match inserted {
            Ok(id) => id,
            Err(e) => {
                rollback(&conn).await;
                return Err(e);
            }
        };
        commit(&conn).await?;

        tracing::info!(page_id = id, page_type, ?parent_id, "created page");

        let page = self.reload(id).await?;
        self.emit(PageEvent::Created(page.clone()));
        Ok(page)
    }

    async fn insert_page(
        &self,
        conn: &Connection,
        page_type: &str,
        title: &str,
        segment: &str,
        parent_id: Option<i64>,
    ) -> Result<i64, PageServiceError> {
        let position: TreePosition = NestedSetHelper::insert_position(conn, parent_id).await?;

        conn.execute(
            "INSERT INTO page (title, type, slug, position_left, position_right, position_depth,
                               created_at, created_by, access)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            vec![
                Value::Text(title.to_string()),
                Value::Text(page_type.to_lowercase()),
                Value::Text(segment.to_string()),
                Value::Integer(position.left),
                Value::Integer(position.right),
                Value::Integer(position.depth),
                Value::Integer(Utc::now().timestamp()),
                nullable_int(self.actor().id),
                Value::Integer(ACCESS_INHERIT),
            ],
        )
        .await
        .map_err(|e| PageServiceError::transaction_failed(format!("Failed to insert page: {}", e)))?;

        Ok(conn.last_insert_rowid())
    }

    //
    // EDIT
    //

    /// Persist the editable columns of `page` and replace its access groups
    ///
    /// A page whose access was inherited is stored as inheriting again, so
    /// saving never pins an ancestor's access onto the page. The tree
    /// position and slug are left alone; they change only through the tree
    /// and slug operations, and the returned page carries the stored ones.
    pub async fn save(&self, page: &Page) -> Result<Page, PageServiceError> {
        let mut page = page.clone();
        page.authorship.update(Utc::now(), self.actor().id);

        let conn = self.db.begin_transaction().await?;
        if let Err(e) = Self::write_page(&conn, &page).await {
            rollback(&conn).await;
            return Err(e);
        }
        commit(&conn).await?;

        let stored = self.reload(page.id).await?;
        page.slug = stored.slug;
        page.left = stored.left;
        page.right = stored.right;
        page.depth = stored.depth;

        tracing::info!(page_id = page.id, "saved page");

        self.emit(PageEvent::Edited(page.clone()));
        Ok(page)
    }

    async fn write_page(conn: &Connection, page: &Page) -> Result<(), PageServiceError> {
        let access = if page.access_inherited {
            ACCESS_INHERIT
        } else {
            page.access
        };

        let updated = conn
            .execute(
                "UPDATE page SET
                    title = ?,
                    type = ?,
                    publish_at = ?,
                    unpublish_at = ?,
                    updated_at = ?,
                    updated_by = ?,
                    meta_title = ?,
                    meta_description = ?,
                    meta_html_head = ?,
                    meta_html_foot = ?,
                    visibility_search = ?,
                    visibility_menu = ?,
                    visibility_aggregator = ?,
                    password = ?,
                    access = ?,
                    comment_enabled = ?,
                    comment_access = ?,
                    comment_approval = ?,
                    comment_expiry = ?
                 WHERE page_id = ?",
                vec![
                    Value::Text(page.title.clone()),
                    Value::Text(page.page_type.name().to_lowercase()),
                    nullable_int(page.publish_date_range.start.map(|d| d.timestamp())),
                    nullable_int(page.publish_date_range.end.map(|d| d.timestamp())),
                    nullable_int(page.authorship.updated_at.map(|d| d.timestamp())),
                    nullable_int(page.authorship.updated_by),
                    nullable_text(page.meta_title.as_deref()),
                    nullable_text(page.meta_description.as_deref()),
                    nullable_text(page.meta_html_head.as_deref()),
                    nullable_text(page.meta_html_foot.as_deref()),
                    Value::Integer(page.visibility_search as i64),
                    Value::Integer(page.visibility_menu as i64),
                    Value::Integer(page.visibility_aggregator as i64),
                    nullable_text(page.password.as_deref()),
                    Value::Integer(access),
                    Value::Integer(page.comments.enabled as i64),
                    Value::Integer(page.comments.access),
                    Value::Integer(page.comments.approval as i64),
                    nullable_int(page.comments.expiry),
                    Value::Integer(page.id),
                ],
            )
            .await
            .map_err(|e| PageServiceError::transaction_failed(format!("Failed to update page: {}", e)))?;

        if updated == 0 {
            return Err(PageServiceError::page_not_found(page.id));
        }

        conn.execute(
            "DELETE FROM page_access_group WHERE page_id = ?",
            vec![Value::Integer(page.id)],
        )
        .await
        .map_err(|e| {
            PageServiceError::transaction_failed(format!("Failed to clear access groups: {}", e))
        })?;

        if !page.access_inherited {
            for group in page.access_group_names() {
                conn.execute(
                    "INSERT INTO page_access_group (page_id, group_name) VALUES (?, ?)",
                    vec![Value::Integer(page.id), Value::Text(group.to_string())],
                )
                .await
                .map_err(|e| {
                    PageServiceError::transaction_failed(format!("Failed to add access group: {}", e))
                })?;
            }
        }

        Ok(())
    }

    /// Replace the last segment of `page`'s slug
    ///
    /// The current full slug is archived to the slug history first, so
    /// lookups with history checking keep resolving it.
    pub async fn update_slug(&self, page: &Page, new_slug: &str) -> Result<Page, PageServiceError> {
        let segment = new_slug.trim();
        if segment.is_empty() {
            return Err(PageServiceError::invalid_slug(new_slug, "slug is empty"));
        }
        if segment.contains('/') {
            return Err(PageServiceError::invalid_slug(
                new_slug,
                "slug must be a single path segment",
            ));
        }

        if !page.slug.is_root() {
            self.ensure_slug_free(&page.slug.with_last_segment(segment), Some(page.id))
                .await?;
        }

        let old_slug = page.slug.full();
        let conn = self.db.begin_transaction().await?;
        if let Err(e) = self.write_slug(&conn, page, &old_slug, segment).await {
            rollback(&conn).await;
            return Err(e);
        }
        commit(&conn).await?;

        let mut page = page.clone();
        if !page.slug.is_root() {
            page.slug = page.slug.with_last_segment(segment);
        }

        tracing::info!(page_id = page.id, old_slug = %old_slug, new_slug = %page.slug, "changed slug");

        self.emit(PageEvent::SlugChanged {
            page: page.clone(),
            old_slug,
        });
        Ok(page)
    }

    async fn write_slug(
        &self,
        conn: &Connection,
        page: &Page,
        old_slug: &str,
        segment: &str,
    ) -> Result<(), PageServiceError> {
        // `/` is never archived
        if !page.slug.is_root() {
            conn.execute(
                "REPLACE INTO page_slug_history (slug, page_id, created_at, created_by)
                 VALUES (?, ?, ?, ?)",
                vec![
                    Value::Text(old_slug.to_string()),
                    Value::Integer(page.id),
                    Value::Integer(Utc::now().timestamp()),
                    nullable_int(self.actor().id),
                ],
            )
            .await
            .map_err(|e| {
                PageServiceError::transaction_failed(format!("Failed to archive slug: {}", e))
            })?;
        }

        conn.execute(
            "UPDATE page SET slug = ? WHERE page_id = ?",
            vec![Value::Text(segment.to_string()), Value::Integer(page.id)],
        )
        .await
        .map_err(|e| PageServiceError::transaction_failed(format!("Failed to update slug: {}", e)))?;

        Ok(())
    }

    /// Delete one historical slug; false when it was not recorded
    pub async fn remove_historical_slug(&self, slug: &str) -> Result<bool, PageServiceError> {
        let removed = self
            .db
            .execute(
                "DELETE FROM page_slug_history WHERE slug = ?",
                vec![Value::Text(slug.to_string())],
            )
            .await?;
        Ok(removed > 0)
    }

    /// Publish from now on; a past end is cleared, a future end is kept
    pub async fn publish(&self, page: &Page) -> Result<Page, PageServiceError> {
        let now = Utc::now();
        let end = page.publish_date_range.end.filter(|end| *end > now);
        let page = self
            .write_publish_window(page, DateRange::new(Some(now), end))
            .await?;

        self.emit(PageEvent::Published(page.clone()));
        Ok(page)
    }

    /// End publication now; a start after now is cleared
    pub async fn unpublish(&self, page: &Page) -> Result<Page, PageServiceError> {
        let now = Utc::now();
        let start = page.publish_date_range.start.filter(|start| *start <= now);
        let page = self
            .write_publish_window(page, DateRange::new(start, Some(now)))
            .await?;

        self.emit(PageEvent::Unpublished(page.clone()));
        Ok(page)
    }

    async fn write_publish_window(
        &self,
        page: &Page,
        range: DateRange,
    ) -> Result<Page, PageServiceError> {
        let updated = self
            .db
            .execute(
                "UPDATE page SET publish_at = ?, unpublish_at = ? WHERE page_id = ?",
                vec![
                    nullable_int(range.start.map(|d| d.timestamp())),
                    nullable_int(range.end.map(|d| d.timestamp())),
                    Value::Integer(page.id),
                ],
            )
            .await?;
        if updated == 0 {
            return Err(PageServiceError::page_not_found(page.id));
        }

        tracing::info!(page_id = page.id, start = ?range.start, end = ?range.end, "changed publish window");

        let mut page = page.clone();
        page.publish_date_range = range;
        Ok(page)
    }

    //
    // TREE
    //

    /// Move `page` among its siblings
    ///
    /// With `Some(sibling)` the page is placed directly after that sibling,
    /// which must share the page's parent. With `None` it becomes the first
    /// of its siblings.
    pub async fn change_order(
        &self,
        page: &Page,
        nearest_sibling_id: Option<i64>,
    ) -> Result<(), PageServiceError> {
        if nearest_sibling_id == Some(page.id) {
            return Err(PageServiceError::invalid_move(format!(
                "page {} cannot be ordered relative to itself",
                page.id
            )));
        }

        let conn = self.db.begin_transaction().await?;
        let moved = match self.reorder(&conn, page.id, nearest_sibling_id).await {
            Ok(moved) => moved,
            Err(e) => {
                rollback(&conn).await;
                tracing::warn!(page_id = page.id, error = %e, "reorder failed");
                return Err(e);
            }
        };
        commit(&conn).await?;

        if moved {
            tracing::info!(page_id = page.id, ?nearest_sibling_id, "reordered page");
            self.emit(PageEvent::Moved { page_id: page.id });
        }
        Ok(())
    }

    /// Returns false when the page already is where it was asked to go
    async fn reorder(
        &self,
        conn: &Connection,
        page_id: i64,
        nearest_sibling_id: Option<i64>,
    ) -> Result<bool, PageServiceError> {
        let node = NestedSetHelper::position(conn, page_id)
            .await?
            .ok_or_else(|| PageServiceError::page_not_found(page_id))?;
        let parent = parent_bounds(conn, &node).await?;

        let target = match nearest_sibling_id {
            Some(sibling_id) => {
                let sibling = NestedSetHelper::position(conn, sibling_id)
                    .await?
                    .ok_or_else(|| PageServiceError::page_not_found(sibling_id))?;
                if sibling.depth != node.depth || parent_bounds(conn, &sibling).await? != parent {
                    return Err(PageServiceError::invalid_move(format!(
                        "page {} is not a sibling of page {}",
                        sibling_id, page_id
                    )));
                }
                if sibling.right + 1 == node.left {
                    return Ok(false);
                }
                MoveTarget::After(sibling_id)
            }
            None => {
                let first = query_scalar_on(
                    conn,
                    "SELECT page_id FROM page
                     WHERE position_left > ? AND position_right < ? AND position_depth = ?
                     ORDER BY position_left
                     LIMIT 1",
                    vec![
                        Value::Integer(parent.0),
                        Value::Integer(parent.1),
                        Value::Integer(node.depth),
                    ],
                )
                .await?;
                match first {
                    Some(first) if first != page_id => MoveTarget::Before(first),
                    _ => return Ok(false),
                }
            }
        };

        NestedSetHelper::move_subtree(conn, page_id, target).await?;
        Ok(true)
    }

    /// Move page `page_id` (with its subtree) to be the last child of
    /// `new_parent_id`, or the last top-level page
    pub async fn change_parent(
        &self,
        page_id: i64,
        new_parent_id: Option<i64>,
    ) -> Result<(), PageServiceError> {
        let target = match new_parent_id {
            Some(parent_id) => MoveTarget::LastChildOf(parent_id),
            None => MoveTarget::TopLevel,
        };

        let segment = self.stored_segment(page_id).await?;
        if let Some(path) = self.new_page_path(new_parent_id, &segment).await? {
            self.ensure_slug_free(&path, Some(page_id)).await?;
        }

        let conn = self.db.begin_transaction().await?;
        if let Err(e) = NestedSetHelper::move_subtree(&conn, page_id, target).await {
            rollback(&conn).await;
            tracing::warn!(page_id, ?new_parent_id, error = %e, "reparent failed");
            return Err(e.into());
        }
        commit(&conn).await?;

        tracing::info!(page_id, ?new_parent_id, "moved page to new parent");
        self.emit(PageEvent::Moved { page_id });
        Ok(())
    }

    //
    // LIFECYCLE
    //

    /// Soft-delete a page; the row stays in the tree
    pub async fn delete(&self, page: &Page) -> Result<Page, PageServiceError> {
        let now = Utc::now();
        let deleted = self
            .db
            .execute(
                "UPDATE page SET deleted_at = ?, deleted_by = ? WHERE page_id = ?",
                vec![
                    Value::Integer(now.timestamp()),
                    nullable_int(self.actor().id),
                    Value::Integer(page.id),
                ],
            )
            .await?;
        if deleted == 0 {
            return Err(PageServiceError::page_not_found(page.id));
        }

        tracing::info!(page_id = page.id, "deleted page");

        let page = self.reload(page.id).await?;
        self.emit(PageEvent::Deleted(page.clone()));
        Ok(page)
    }

    pub async fn restore(&self, page: &Page) -> Result<Page, PageServiceError> {
        let restored = self
            .db
            .execute(
                "UPDATE page SET deleted_at = NULL, deleted_by = NULL WHERE page_id = ?",
                vec![Value::Integer(page.id)],
            )
            .await?;
        if restored == 0 {
            return Err(PageServiceError::page_not_found(page.id));
        }

        tracing::info!(page_id = page.id, "restored page");

        let page = self.reload(page.id).await?;
        self.emit(PageEvent::Restored(page.clone()));
        Ok(page)
    }

    /// Replace the tags of a page
    pub async fn set_tags<I, S>(&self, page: &Page, tags: I) -> Result<Page, PageServiceError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut page = page.clone();
        page.set_tags(
            tags.into_iter()
                .map(Into::into)
                .map(|tag: String| tag.trim().to_string())
                .filter(|tag| !tag.is_empty()),
        );

        let conn = self.db.begin_transaction().await?;
        if let Err(e) = Self::write_tags(&conn, &page).await {
            rollback(&conn).await;
            return Err(e);
        }
        commit(&conn).await?;

        self.emit(PageEvent::TagsChanged(page.clone()));
        Ok(page)
    }

    async fn write_tags(conn: &Connection, page: &Page) -> Result<(), PageServiceError> {
        conn.execute(
            "DELETE FROM page_tag WHERE page_id = ?",
            vec![Value::Integer(page.id)],
        )
        .await
        .map_err(|e| PageServiceError::transaction_failed(format!("Failed to clear tags: {}", e)))?;

        for tag in &page.tags {
            conn.execute(
                "INSERT INTO page_tag (page_id, tag_name) VALUES (?, ?)",
                vec![Value::Integer(page.id), Value::Text(tag.clone())],
            )
            .await
            .map_err(|e| PageServiceError::transaction_failed(format!("Failed to add tag: {}", e)))?;
        }
        Ok(())
    }

    /// Replace the stored content of a page
    pub async fn save_content(&self, page: &Page, content: &Content) -> Result<(), PageServiceError> {
        let rows = content_rows(content);

        let conn = self.db.begin_transaction().await?;
        if let Err(e) = Self::write_content(&conn, page.id, &rows).await {
            rollback(&conn).await;
            return Err(e);
        }
        commit(&conn).await?;

        tracing::info!(page_id = page.id, rows = rows.len(), "saved page content");
        self.emit(PageEvent::ContentSaved { page_id: page.id });
        Ok(())
    }

    async fn write_content(
        conn: &Connection,
        page_id: i64,
        rows: &[ContentRow],
    ) -> Result<(), PageServiceError> {
        conn.execute(
            "DELETE FROM page_content WHERE page_id = ?",
            vec![Value::Integer(page_id)],
        )
        .await
        .map_err(|e| PageServiceError::transaction_failed(format!("Failed to clear content: {}", e)))?;

        for row in rows {
            conn.execute(
                "INSERT INTO page_content (page_id, field_name, group_name, sequence, data_name, value_string)
                 VALUES (?, ?, ?, ?, ?, ?)",
                vec![
                    Value::Integer(page_id),
                    Value::Text(row.field_name.clone()),
                    Value::Text(row.group_name.clone()),
                    Value::Integer(row.sequence),
                    Value::Text(row.data_name.clone()),
                    Value::Text(row.value.clone()),
                ],
            )
            .await
            .map_err(|e| {
                PageServiceError::transaction_failed(format!("Failed to write content: {}", e))
            })?;
        }
        Ok(())
    }
}

/// `(left, right)` of the parent of `node`, or the virtual root's bounds
async fn parent_bounds(
    conn: &Connection,
    node: &TreePosition,
) -> Result<(i64, i64), PageServiceError> {
    if node.depth == 0 {
        return Ok((0, i64::MAX));
    }

    let mut rows = conn
        .query(
            "SELECT position_left, position_right FROM page
             WHERE position_left < ? AND position_right > ? AND position_depth = ?",
            vec![
                Value::Integer(node.left),
                Value::Integer(node.right),
                Value::Integer(node.depth - 1),
            ],
        )
        .await
        .map_err(|e| PageServiceError::query_failed(format!("Failed to load parent: {}", e)))?;

    match rows.next().await.map_err(DatabaseError::from)? {
        Some(row) => Ok((
            row.get::<i64>(0).map_err(DatabaseError::from)?,
            row.get::<i64>(1).map_err(DatabaseError::from)?,
        )),
        None => Err(PageServiceError::invalid_move(format!(
            "page {} has no parent row",
            node.id
        ))),
    }
}

#[cfg(test)]
#[path = "page_writer_test.rs"]
mod page_writer_test;

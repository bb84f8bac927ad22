//! Nested-Set Mutations
//!
//! Re-numbering of `position_left` / `position_right` / `position_depth` for
//! inserts and subtree moves. Every function here runs on a connection that
//! already holds an open transaction; the caller commits or rolls back, so a
//! failed move never leaves a half-updated range behind.
//!
//! A move works in five steps:
//!
//! 1. negate the coordinates of the moved subtree to take it out of the tree
//! 2. close the gap it left behind
//! 3. shift the destination by the subtree width if it lay after the gap
//! 4. open a gap of the same width at the destination
//! 5. flip the subtree back into the gap, adjusting its depth

use crate::db::database::query_scalar_on;
use crate::db::error::DatabaseError;
use libsql::{Connection, Value};
use thiserror::Error;

/// Nested-set coordinates of one page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreePosition {
    pub id: i64,
    pub left: i64,
    pub right: i64,
    pub depth: i64,
}

impl TreePosition {
    /// Number of coordinates the subtree rooted here occupies
    pub fn width(&self) -> i64 {
        self.right - self.left + 1
    }

    /// True when `other` is this node or one of its descendants
    pub fn contains(&self, other: &TreePosition) -> bool {
        self.left <= other.left && other.right <= self.right
    }
}

/// Where a subtree should end up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveTarget {
    /// Last child of the given page
    LastChildOf(i64),
    /// Immediately before the given page, as its sibling
    Before(i64),
    /// Immediately after the given page, as its sibling
    After(i64),
    /// Last top-level page
    TopLevel,
}

#[derive(Error, Debug)]
pub enum NestedSetError {
    #[error("Page {0} does not exist")]
    PageNotFound(i64),

    #[error("Cannot move page {page} relative to page {target} inside its own subtree")]
    IntoOwnSubtree { page: i64, target: i64 },

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Nested-set arithmetic on the `page` table
pub struct NestedSetHelper;

impl NestedSetHelper {
    /// Coordinates of page `id`, if it exists
    pub async fn position(conn: &Connection, id: i64) -> Result<Option<TreePosition>, DatabaseError> {
        let mut rows = conn
            .query(
                "SELECT position_left, position_right, position_depth FROM page WHERE page_id = ?",
                vec![Value::Integer(id)],
            )
            .await
            .map_err(|e| DatabaseError::query_failed(format!("Failed to read position: {}", e)))?;

        match rows
            .next()
            .await
            .map_err(|e| DatabaseError::query_failed(format!("Failed to fetch row: {}", e)))?
        {
            Some(row) => Ok(Some(TreePosition {
                id,
                left: row.get::<i64>(0)?,
                right: row.get::<i64>(1)?,
                depth: row.get::<i64>(2)?,
            })),
            None => Ok(None),
        }
    }

    async fn require(conn: &Connection, id: i64) -> Result<TreePosition, NestedSetError> {
        Self::position(conn, id)
            .await?
            .ok_or(NestedSetError::PageNotFound(id))
    }

    /// Highest `position_right` in the tree, 0 for an empty tree
    async fn max_right(conn: &Connection) -> Result<i64, DatabaseError> {
        Ok(query_scalar_on(conn, "SELECT MAX(position_right) FROM page", vec![])
            .await?
            .unwrap_or(0))
    }

    /// Reserve coordinates for a new leaf page
    ///
    /// With a parent, a two-wide gap is opened at the parent's right edge so
    /// the new page becomes its last child; without one the page is appended
    /// after the last top-level page. The returned position has `id` 0: the
    /// row does not exist yet.
    pub async fn insert_position(
        conn: &Connection,
        parent_id: Option<i64>,
    ) -> Result<TreePosition, NestedSetError> {
        let Some(parent_id) = parent_id else {
            let left = Self::max_right(conn).await? + 1;
            return Ok(TreePosition {
                id: 0,
                left,
                right: left + 1,
                depth: 0,
            });
        };

        let parent = Self::require(conn, parent_id).await?;

        execute(
            conn,
            "UPDATE page SET position_right = position_right + 2 WHERE position_right >= ?",
            vec![Value::Integer(parent.right)],
        )
        .await?;
        execute(
            conn,
            "UPDATE page SET position_left = position_left + 2 WHERE position_left > ?",
            vec![Value::Integer(parent.right)],
        )
        .await?;

        Ok(TreePosition {
            id: 0,
            left: parent.right,
            right: parent.right + 1,
            depth: parent.depth + 1,
        })
    }

    /// Move page `id` and its subtree to `target`
    pub async fn move_subtree(
        conn: &Connection,
        id: i64,
        target: MoveTarget,
    ) -> Result<(), NestedSetError> {
        let node = Self::require(conn, id).await?;

        let (mut dest, new_depth) = match target {
            MoveTarget::LastChildOf(parent_id) => {
                let parent = Self::require(conn, parent_id).await?;
                if node.contains(&parent) {
                    return Err(NestedSetError::IntoOwnSubtree {
                        page: id,
                        target: parent_id,
                    });
                }
                (parent.right, parent.depth + 1)
            }
            MoveTarget::Before(sibling_id) | MoveTarget::After(sibling_id) => {
                let sibling = Self::require(conn, sibling_id).await?;
                if node.contains(&sibling) {
                    return Err(NestedSetError::IntoOwnSubtree {
                        page: id,
                        target: sibling_id,
                    });
                }
                let dest = if matches!(target, MoveTarget::Before(_)) {
                    sibling.left
                } else {
                    sibling.right + 1
                };
                (dest, sibling.depth)
            }
            MoveTarget::TopLevel => (Self::max_right(conn).await? + 1, 0),
        };

        let width = node.width();

        execute(
            conn,
            "UPDATE page SET position_left = -position_left, position_right = -position_right
             WHERE position_left >= ? AND position_right <= ?",
            vec![Value::Integer(node.left), Value::Integer(node.right)],
        )
        .await?;

        execute(
            conn,
            "UPDATE page SET position_left = position_left - ? WHERE position_left > ?",
            vec![Value::Integer(width), Value::Integer(node.right)],
        )
        .await?;
        execute(
            conn,
            "UPDATE page SET position_right = position_right - ? WHERE position_right > ?",
            vec![Value::Integer(width), Value::Integer(node.right)],
        )
        .await?;

        if dest > node.right {
            dest -= width;
        }

        execute(
            conn,
            "UPDATE page SET position_left = position_left + ? WHERE position_left >= ?",
            vec![Value::Integer(width), Value::Integer(dest)],
        )
        .await?;
        execute(
            conn,
            "UPDATE page SET position_right = position_right + ? WHERE position_right >= ?",
            vec![Value::Integer(width), Value::Integer(dest)],
        )
        .await?;

        execute(
            conn,
            "UPDATE page SET
                position_left = -position_left + ?,
                position_right = -position_right + ?,
                position_depth = position_depth + ?
             WHERE position_left < 0",
            vec![
                Value::Integer(dest - node.left),
                Value::Integer(dest - node.left),
                Value::Integer(new_depth - node.depth),
            ],
        )
        .await?;

        tracing::debug!(page_id = id, ?target, dest, "moved subtree");

        Ok(())
    }
}

async fn execute(conn: &Connection, sql: &str, params: Vec<Value>) -> Result<u64, DatabaseError> {
    conn.execute(sql, params)
        .await
        .map_err(|e| DatabaseError::query_failed(format!("Failed to renumber tree: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::database::{commit, rollback, DatabaseService};
    use tempfile::TempDir;

    /// Insert a page row at the given coordinates
    async fn insert(conn: &Connection, id: i64, left: i64, right: i64, depth: i64) {
        conn.execute(
            "INSERT INTO page (page_id, type, slug, position_left, position_right, position_depth, created_at)
             VALUES (?, 'basic', ?, ?, ?, ?, 0)",
            vec![
                Value::Integer(id),
                Value::Text(format!("p{}", id)),
                Value::Integer(left),
                Value::Integer(right),
                Value::Integer(depth),
            ],
        )
        .await
        .unwrap();
    }

    /// root(1) -> [a(2) -> [a1(3)], b(4)], other(5)
    async fn create_tree() -> (DatabaseService, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = DatabaseService::new(temp_dir.path().join("tree.db"))
            .await
            .unwrap();
        let conn = db.connect_with_timeout().await.unwrap();
        insert(&conn, 1, 1, 8, 0).await;
        insert(&conn, 2, 2, 5, 1).await;
        insert(&conn, 3, 3, 4, 2).await;
        insert(&conn, 4, 6, 7, 1).await;
        insert(&conn, 5, 9, 10, 0).await;
        (db, temp_dir)
    }

    async fn positions(db: &DatabaseService) -> Vec<(i64, i64, i64, i64)> {
        let conn = db.connect_with_timeout().await.unwrap();
        let mut rows = conn
            .query(
                "SELECT page_id, position_left, position_right, position_depth FROM page ORDER BY page_id",
                (),
            )
            .await
            .unwrap();
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.unwrap() {
            out.push((
                row.get::<i64>(0).unwrap(),
                row.get::<i64>(1).unwrap(),
                row.get::<i64>(2).unwrap(),
                row.get::<i64>(3).unwrap(),
            ));
        }
        out
    }

    async fn apply(db: &DatabaseService, id: i64, target: MoveTarget) -> Result<(), NestedSetError> {
        let conn = db.begin_transaction().await.unwrap();
        match NestedSetHelper::move_subtree(&conn, id, target).await {
            Ok(()) => {
                commit(&conn).await.unwrap();
                Ok(())
            }
            Err(e) => {
                rollback(&conn).await;
                Err(e)
            }
        }
    }

    #[tokio::test]
    async fn test_insert_position_under_parent() {
        let (db, _temp) = create_tree().await;
        let conn = db.begin_transaction().await.unwrap();

        let pos = NestedSetHelper::insert_position(&conn, Some(2)).await.unwrap();
        assert_eq!((pos.left, pos.right, pos.depth), (5, 6, 2));
        insert(&conn, 6, pos.left, pos.right, pos.depth).await;
        commit(&conn).await.unwrap();

        assert_eq!(
            positions(&db).await,
            vec![
                (1, 1, 10, 0),
                (2, 2, 7, 1),
                (3, 3, 4, 2),
                (4, 8, 9, 1),
                (5, 11, 12, 0),
                (6, 5, 6, 2),
            ]
        );
    }

    #[tokio::test]
    async fn test_insert_position_top_level() {
        let (db, _temp) = create_tree().await;
        let conn = db.begin_transaction().await.unwrap();

        let pos = NestedSetHelper::insert_position(&conn, None).await.unwrap();
        assert_eq!((pos.left, pos.right, pos.depth), (11, 12, 0));
        rollback(&conn).await;
    }

    #[tokio::test]
    async fn test_move_under_new_parent() {
        let (db, _temp) = create_tree().await;

        // a (with its child) becomes the last child of other
        apply(&db, 2, MoveTarget::LastChildOf(5)).await.unwrap();

        assert_eq!(
            positions(&db).await,
            vec![
                (1, 1, 4, 0),
                (2, 6, 9, 1),
                (3, 7, 8, 2),
                (4, 2, 3, 1),
                (5, 5, 10, 0),
            ]
        );
    }

    #[tokio::test]
    async fn test_move_after_sibling() {
        let (db, _temp) = create_tree().await;

        apply(&db, 2, MoveTarget::After(4)).await.unwrap();

        assert_eq!(
            positions(&db).await,
            vec![
                (1, 1, 8, 0),
                (2, 4, 7, 1),
                (3, 5, 6, 2),
                (4, 2, 3, 1),
                (5, 9, 10, 0),
            ]
        );
    }

    #[tokio::test]
    async fn test_move_before_sibling_and_to_top_level() {
        let (db, _temp) = create_tree().await;

        apply(&db, 5, MoveTarget::Before(1)).await.unwrap();
        assert_eq!(
            positions(&db).await,
            vec![
                (1, 3, 10, 0),
                (2, 4, 7, 1),
                (3, 5, 6, 2),
                (4, 8, 9, 1),
                (5, 1, 2, 0),
            ]
        );

        apply(&db, 3, MoveTarget::TopLevel).await.unwrap();
        assert_eq!(
            positions(&db).await,
            vec![
                (1, 3, 8, 0),
                (2, 4, 5, 1),
                (3, 9, 10, 0),
                (4, 6, 7, 1),
                (5, 1, 2, 0),
            ]
        );
    }

    #[tokio::test]
    async fn test_move_into_own_subtree_is_rejected() {
        let (db, _temp) = create_tree().await;
        let before = positions(&db).await;

        assert!(matches!(
            apply(&db, 1, MoveTarget::LastChildOf(3)).await,
            Err(NestedSetError::IntoOwnSubtree { page: 1, target: 3 })
        ));
        assert!(matches!(
            apply(&db, 2, MoveTarget::After(2)).await,
            Err(NestedSetError::IntoOwnSubtree { .. })
        ));
        assert!(matches!(
            apply(&db, 2, MoveTarget::LastChildOf(99)).await,
            Err(NestedSetError::PageNotFound(99))
        ));

        assert_eq!(positions(&db).await, before);
    }
}

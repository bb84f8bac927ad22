//! Database Connection Management
//!
//! Connection and schema management for the page store, backed by an
//! embedded libsql database.
//!
//! # Tables
//!
//! - `page`: one row per page, positioned in the tree by nested-set
//!   coordinates (`position_left`, `position_right`, `position_depth`)
//! - `page_access_group`: page id / group name join rows
//! - `page_slug_history`: historical full slugs pointing at a page id
//! - `page_content`: flat key/value content rows
//! - `page_tag`: page id / tag join rows
//!
//! Only the last slug segment is stored on `page.slug`; full slugs are
//! rebuilt from the ancestor chain on load.
//!
//! # Database Connection Patterns
//!
//! Use `connect_with_timeout()` in async functions. The busy timeout lets
//! a connection wait for a concurrent writer instead of failing with
//! `SQLITE_BUSY`.
//!
//! ```no_run
//! # use pagespace_core::db::DatabaseService;
//! # use std::path::PathBuf;
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let db = DatabaseService::new(PathBuf::from("./data/pagespace.db")).await?;
//! let conn = db.connect_with_timeout().await?;
//! # Ok(())
//! # }
//! ```

use crate::db::error::DatabaseError;
use libsql::{Builder, Connection, Database, Value};
use std::path::PathBuf;
use std::sync::Arc;

/// Default busy timeout applied to every connection (milliseconds)
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

/// Database service for managing the libsql connection and schema
#[derive(Debug, Clone)]
pub struct DatabaseService {
    /// libsql database handle (wrapped in Arc for sharing)
    pub db: Arc<Database>,

    /// Path to the database file
    pub db_path: PathBuf,

    busy_timeout_ms: u64,
}

impl DatabaseService {
    /// Open (or create) the database at `db_path` and initialize the schema
    ///
    /// This will:
    /// 1. Ensure the parent directory exists
    /// 2. Open/create the database file
    /// 3. Create tables and indexes (CREATE ... IF NOT EXISTS)
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the directory cannot be created, the
    /// connection fails, or schema initialization fails.
    pub async fn new(db_path: PathBuf) -> Result<Self, DatabaseError> {
        Self::with_busy_timeout(db_path, DEFAULT_BUSY_TIMEOUT_MS).await
    }

    /// Same as [`DatabaseService::new`] with an explicit busy timeout
    pub async fn with_busy_timeout(
        db_path: PathBuf,
        busy_timeout_ms: u64,
    ) -> Result<Self, DatabaseError> {
        let is_new_database = !db_path.exists();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    if e.kind() == std::io::ErrorKind::PermissionDenied {
                        DatabaseError::store_not_writable(db_path.clone())
                    } else {
                        DatabaseError::StoreDirectory(e)
                    }
                })?;
            }
        }

        let db = Builder::new_local(&db_path)
            .build()
            .await
            .map_err(|e| DatabaseError::open_failed(db_path.clone(), e))?;

        let service = Self {
            db: Arc::new(db),
            db_path,
            busy_timeout_ms,
        };

        service.initialize_schema(is_new_database).await?;

        tracing::debug!(path = %service.db_path.display(), "page store ready");

        Ok(service)
    }

    /// Execute a PRAGMA statement
    ///
    /// PRAGMA statements return rows, so they go through query() rather
    /// than execute().
    async fn execute_pragma(&self, conn: &Connection, pragma: &str) -> Result<(), DatabaseError> {
        let mut stmt = conn.prepare(pragma).await.map_err(|e| {
            DatabaseError::query_failed(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        let _ = stmt.query(()).await.map_err(|e| {
            DatabaseError::query_failed(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        Ok(())
    }

    /// Create tables and indexes; safe to call repeatedly
    async fn initialize_schema(&self, is_new_database: bool) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        self.execute_pragma(&conn, "PRAGMA journal_mode = WAL")
            .await?;

        let statements = [
            (
                "page",
                "CREATE TABLE IF NOT EXISTS page (
                    page_id INTEGER PRIMARY KEY AUTOINCREMENT,
                    title TEXT NOT NULL DEFAULT '',
                    type TEXT NOT NULL,
                    slug TEXT NOT NULL DEFAULT '',
                    position_left INTEGER NOT NULL DEFAULT 0,
                    position_right INTEGER NOT NULL DEFAULT 0,
                    position_depth INTEGER NOT NULL DEFAULT 0,
                    publish_at INTEGER,
                    unpublish_at INTEGER,
                    created_at INTEGER NOT NULL,
                    created_by INTEGER,
                    updated_at INTEGER,
                    updated_by INTEGER,
                    deleted_at INTEGER,
                    deleted_by INTEGER,
                    meta_title TEXT,
                    meta_description TEXT,
                    meta_html_head TEXT,
                    meta_html_foot TEXT,
                    visibility_search INTEGER NOT NULL DEFAULT 1,
                    visibility_menu INTEGER NOT NULL DEFAULT 1,
                    visibility_aggregator INTEGER NOT NULL DEFAULT 1,
                    password TEXT,
                    -- negative access means inherit from the parent page
                    access INTEGER NOT NULL DEFAULT -100,
                    comment_enabled INTEGER NOT NULL DEFAULT 0,
                    comment_access INTEGER NOT NULL DEFAULT 0,
                    comment_approval INTEGER NOT NULL DEFAULT 0,
                    comment_expiry INTEGER
                )",
            ),
            (
                "page_access_group",
                "CREATE TABLE IF NOT EXISTS page_access_group (
                    page_id INTEGER NOT NULL,
                    group_name TEXT NOT NULL,
                    PRIMARY KEY (page_id, group_name)
                )",
            ),
            (
                "page_slug_history",
                "CREATE TABLE IF NOT EXISTS page_slug_history (
                    slug TEXT PRIMARY KEY,
                    page_id INTEGER NOT NULL,
                    created_at INTEGER NOT NULL,
                    created_by INTEGER
                )",
            ),
            (
                "page_content",
                "CREATE TABLE IF NOT EXISTS page_content (
                    page_id INTEGER NOT NULL,
                    field_name TEXT NOT NULL,
                    group_name TEXT NOT NULL DEFAULT '',
                    sequence INTEGER NOT NULL DEFAULT 0,
                    data_name TEXT NOT NULL DEFAULT '',
                    value_string TEXT,
                    PRIMARY KEY (page_id, field_name, group_name, sequence, data_name)
                )",
            ),
            (
                "page_tag",
                "CREATE TABLE IF NOT EXISTS page_tag (
                    page_id INTEGER NOT NULL,
                    tag_name TEXT NOT NULL,
                    PRIMARY KEY (page_id, tag_name)
                )",
            ),
        ];

        for (table, sql) in statements {
            conn.execute(sql, ()).await.map_err(|e| {
                DatabaseError::schema(format!(
                    "Failed to create {} table: {}",
                    table, e
                ))
            })?;
        }

        self.create_core_indexes(&conn).await?;

        // Flush the freshly created schema so other connections see it
        if is_new_database {
            self.execute_pragma(&conn, "PRAGMA wal_checkpoint(TRUNCATE)")
                .await?;
        }

        Ok(())
    }

    async fn create_core_indexes(&self, conn: &Connection) -> Result<(), DatabaseError> {
        let indexes = [
            (
                "idx_page_position",
                "CREATE INDEX IF NOT EXISTS idx_page_position ON page(position_left, position_right, position_depth)",
            ),
            (
                "idx_page_type",
                "CREATE INDEX IF NOT EXISTS idx_page_type ON page(type)",
            ),
            (
                "idx_page_slug",
                "CREATE INDEX IF NOT EXISTS idx_page_slug ON page(slug)",
            ),
            (
                "idx_slug_history_page",
                "CREATE INDEX IF NOT EXISTS idx_slug_history_page ON page_slug_history(page_id)",
            ),
            (
                "idx_page_tag_name",
                "CREATE INDEX IF NOT EXISTS idx_page_tag_name ON page_tag(tag_name)",
            ),
        ];

        for (name, sql) in indexes {
            conn.execute(sql, ()).await.map_err(|e| {
                DatabaseError::query_failed(format!("Failed to create index '{}': {}", name, e))
            })?;
        }

        Ok(())
    }

    /// Get a raw connection
    ///
    /// Prefer [`DatabaseService::connect_with_timeout`] in async code.
    pub fn connect(&self) -> Result<Connection, DatabaseError> {
        self.db.connect().map_err(DatabaseError::Libsql)
    }

    /// Get a connection with the busy timeout configured
    pub async fn connect_with_timeout(&self) -> Result<Connection, DatabaseError> {
        let conn = self.connect()?;

        self.execute_pragma(&conn, &format!("PRAGMA busy_timeout = {}", self.busy_timeout_ms))
            .await?;

        Ok(conn)
    }

    //
    // QUERY HELPERS
    // Thin wrappers over the row-set operations the loader and writer need:
    // flatten-to-column, scalar extraction and statement execution.
    //

    /// Run a query and flatten its first column into a list of ids
    pub async fn query_ids(&self, sql: &str, params: Vec<Value>) -> Result<Vec<i64>, DatabaseError> {
        let conn = self.connect_with_timeout().await?;
        query_ids_on(&conn, sql, params).await
    }

    /// Run a query and return the first column of the first row, if any
    ///
    /// A NULL value is reported as `None`, same as an empty result.
    pub async fn query_scalar(
        &self,
        sql: &str,
        params: Vec<Value>,
    ) -> Result<Option<i64>, DatabaseError> {
        let conn = self.connect_with_timeout().await?;
        query_scalar_on(&conn, sql, params).await
    }

    /// Execute a statement and return the number of affected rows
    pub async fn execute(&self, sql: &str, params: Vec<Value>) -> Result<u64, DatabaseError> {
        let conn = self.connect_with_timeout().await?;
        conn.execute(sql, params)
            .await
            .map_err(|e| DatabaseError::query_failed(format!("Failed to execute statement: {}", e)))
    }

    /// Open a connection and start an immediate (write-locking) transaction
    pub async fn begin_transaction(&self) -> Result<Connection, DatabaseError> {
        let conn = self.connect_with_timeout().await?;
        conn.execute("BEGIN IMMEDIATE TRANSACTION", ())
            .await
            .map_err(|e| DatabaseError::query_failed(format!("Failed to begin transaction: {}", e)))?;
        Ok(conn)
    }
}

/// Commit the transaction open on `conn`, rolling back if the commit fails
pub async fn commit(conn: &Connection) -> Result<(), DatabaseError> {
    if let Err(e) = conn.execute("COMMIT", ()).await {
        let _rollback = conn.execute("ROLLBACK", ()).await;
        return Err(DatabaseError::query_failed(format!(
            "Failed to commit transaction: {}",
            e
        )));
    }
    Ok(())
}

/// Roll back the transaction open on `conn`
///
/// Rollback failures are logged, not returned: the caller is already
/// reporting the error that caused the rollback.
pub async fn rollback(conn: &Connection) {
    if let Err(e) = conn.execute("ROLLBACK", ()).await {
        tracing::warn!("Failed to roll back transaction: {}", e);
    }
}

/// Flatten the first column of a query run on an existing connection
pub async fn query_ids_on(
    conn: &Connection,
    sql: &str,
    params: Vec<Value>,
) -> Result<Vec<i64>, DatabaseError> {
    let mut rows = conn
        .query(sql, params)
        .await
        .map_err(|e| DatabaseError::query_failed(format!("Failed to execute query: {}", e)))?;

    let mut ids = Vec::new();
    while let Some(row) = rows
        .next()
        .await
        .map_err(|e| DatabaseError::query_failed(format!("Failed to fetch row: {}", e)))?
    {
        ids.push(row.get::<i64>(0)?);
    }

    Ok(ids)
}

/// First column of the first row of a query run on an existing connection
pub async fn query_scalar_on(
    conn: &Connection,
    sql: &str,
    params: Vec<Value>,
) -> Result<Option<i64>, DatabaseError> {
    let mut rows = conn
        .query(sql, params)
        .await
        .map_err(|e| DatabaseError::query_failed(format!("Failed to execute query: {}", e)))?;

    match rows
        .next()
        .await
        .map_err(|e| DatabaseError::query_failed(format!("Failed to fetch row: {}", e)))?
    {
        Some(row) => Ok(row.get::<Option<i64>>(0)?),
        None => Ok(None),
    }
}

/// Convert an optional integer into a nullable SQL value
pub fn nullable_int(value: Option<i64>) -> Value {
    value.map(Value::Integer).unwrap_or(Value::Null)
}

/// Convert an optional string into a nullable SQL value
pub fn nullable_text(value: Option<&str>) -> Value {
    value
        .map(|s| Value::Text(s.to_string()))
        .unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_schema_initialization_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("pages.db");

        let first = DatabaseService::new(db_path.clone()).await.unwrap();
        drop(first);
        let second = DatabaseService::new(db_path).await.unwrap();

        let count = second
            .query_scalar(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name LIKE 'page%'",
                vec![],
            )
            .await
            .unwrap();
        assert_eq!(count, Some(5));
    }

    #[tokio::test]
    async fn test_creates_missing_parent_directory() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested").join("dir").join("pages.db");

        DatabaseService::new(db_path.clone()).await.unwrap();
        assert!(db_path.parent().unwrap().exists());
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let temp_dir = TempDir::new().unwrap();
        let db = DatabaseService::new(temp_dir.path().join("pages.db"))
            .await
            .unwrap();

        let conn = db.begin_transaction().await.unwrap();
        conn.execute(
            "INSERT INTO page_tag (page_id, tag_name) VALUES (?, ?)",
            vec![Value::Integer(1), Value::Text("news".to_string())],
        )
        .await
        .unwrap();
        rollback(&conn).await;

        let count = db
            .query_scalar("SELECT COUNT(*) FROM page_tag", vec![])
            .await
            .unwrap();
        assert_eq!(count, Some(0));
    }

    #[tokio::test]
    async fn test_query_scalar_null_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let db = DatabaseService::new(temp_dir.path().join("pages.db"))
            .await
            .unwrap();

        let min = db
            .query_scalar("SELECT MIN(position_left) FROM page", vec![])
            .await
            .unwrap();
        assert_eq!(min, None);
    }
}

//! Content Loader
//!
//! Builds the [`Content`] of a page from its page type's schema and the flat
//! rows of the `page_content` table:
//!
//! | column       | meaning                                           |
//! |--------------|---------------------------------------------------|
//! | field_name   | field within the page (or within the group)       |
//! | group_name   | owning group, empty for top-level fields          |
//! | sequence     | instance index of a repeatable group              |
//! | data_name    | value key of a multi-value field, else empty      |
//! | value_string | the stored value                                  |
//!
//! Rows naming a field the schema no longer has are dropped. Content is
//! never cached: every call reads the rows again.

use crate::db::{DatabaseError, DatabaseService};
use crate::models::{Content, ContentSlot, FieldNode, FieldTypeRegistry, Group, Page};
use crate::services::error::PageServiceError;
use crate::services::field_factory::FieldFactory;
use libsql::Value;
use std::sync::Arc;

/// One persisted content value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRow {
    pub field_name: String,
    pub group_name: String,
    pub sequence: i64,
    pub data_name: String,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct ContentLoader {
    db: Arc<DatabaseService>,
    field_types: Arc<FieldTypeRegistry>,
}

impl ContentLoader {
    pub fn new(db: Arc<DatabaseService>, field_types: Arc<FieldTypeRegistry>) -> Self {
        Self { db, field_types }
    }

    /// Empty content seeded from the schema of `page`'s type
    pub fn build_schema(&self, page: &Page) -> Result<Content, PageServiceError> {
        let mut factory = FieldFactory::new(Arc::clone(&self.field_types));
        factory.build(page.page_type())?;

        let mut content = Content::new(page.page_type.name(), factory.validator());
        for node in factory.iter() {
            content.insert(node.name(), ContentSlot::from(node.clone()));
        }
        Ok(content)
    }

    /// Load the content of `page`
    pub async fn load(&self, page: &Page) -> Result<Content, PageServiceError> {
        let rows = self.fetch_rows(page.id).await?;
        let mut content = self.build_schema(page)?;

        for row in rows {
            if !apply_row(&mut content, &row) {
                tracing::debug!(
                    page_id = page.id,
                    field = %row.field_name,
                    group = %row.group_name,
                    "skipping content for field missing from schema"
                );
            }
        }

        Ok(content)
    }

    async fn fetch_rows(&self, page_id: i64) -> Result<Vec<ContentRow>, PageServiceError> {
        let conn = self.db.connect_with_timeout().await?;
        let mut rows = conn
            .query(
                "SELECT field_name, group_name, sequence, data_name, value_string
                 FROM page_content
                 WHERE page_id = ?
                 ORDER BY group_name DESC, sequence ASC, field_name, data_name",
                vec![Value::Integer(page_id)],
            )
            .await
            .map_err(|e| PageServiceError::query_failed(format!("Failed to load content: {}", e)))?;

        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| PageServiceError::query_failed(format!("Failed to fetch row: {}", e)))?
        {
            let Some(value) = row.get::<Option<String>>(4).map_err(DatabaseError::from)? else {
                continue;
            };
            out.push(ContentRow {
                field_name: row.get::<String>(0).map_err(DatabaseError::from)?,
                group_name: row.get::<String>(1).map_err(DatabaseError::from)?,
                sequence: row.get::<i64>(2).map_err(DatabaseError::from)?,
                data_name: row.get::<String>(3).map_err(DatabaseError::from)?,
                value,
            });
        }
        Ok(out)
    }
}

/// Set one stored row on the content; false when its field is unknown
fn apply_row(content: &mut Content, row: &ContentRow) -> bool {
    if row.group_name.is_empty() {
        return content.set_value(&row.field_name, &row.data_name, &row.value);
    }

    let group = match content.get_mut(&row.group_name) {
        Some(ContentSlot::Repeatable(container)) => {
            let Ok(sequence) = usize::try_from(row.sequence) else {
                return false;
            };
            container.get_or_create(sequence)
        }
        Some(ContentSlot::Group(group)) => group,
        _ => return false,
    };

    match group.get_mut(&row.field_name) {
        Some(field) => field.set_stored_value(&row.data_name, &row.value),
        None => false,
    }
}

/// Flatten content into the rows that persist it
pub fn content_rows(content: &Content) -> Vec<ContentRow> {
    let mut rows = Vec::new();
    for (name, slot) in content.iter() {
        match slot {
            ContentSlot::Field(f) => {
                if let Some(value) = f.value() {
                    rows.push(row(name, "", 0, "", value));
                }
            }
            ContentSlot::Multiple(f) => {
                for (key, value) in f.values() {
                    rows.push(row(name, "", 0, key, value));
                }
            }
            ContentSlot::Group(group) => group_rows(&mut rows, group, 0),
            ContentSlot::Repeatable(container) => {
                for (sequence, group) in container.iter().enumerate() {
                    group_rows(&mut rows, group, sequence as i64);
                }
            }
        }
    }
    rows
}

fn group_rows(rows: &mut Vec<ContentRow>, group: &Group, sequence: i64) {
    for field in group.fields() {
        match field {
            FieldNode::Field(f) => {
                if let Some(value) = f.value() {
                    rows.push(row(f.name(), group.name(), sequence, "", value));
                }
            }
            FieldNode::Multiple(f) => {
                for (key, value) in f.values() {
                    rows.push(row(f.name(), group.name(), sequence, key, value));
                }
            }
            FieldNode::Group(_) => {}
        }
    }
}

fn row(field: &str, group: &str, sequence: i64, data_name: &str, value: &str) -> ContentRow {
    ContentRow {
        field_name: field.to_string(),
        group_name: group.to_string(),
        sequence,
        data_name: data_name.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DefinedPageType, Page};
    use tempfile::TempDir;

    const PRODUCT: &str = r#"{
        "name": "product",
        "fields": [
            { "name": "price", "type": "text" },
            { "name": "cta", "type": "link" },
            { "name": "specs", "type": "group", "fields": [
                { "name": "weight", "type": "text" }
            ]},
            { "name": "images", "type": "group", "repeatable": true, "fields": [
                { "name": "caption", "type": "text" },
                { "name": "option", "type": "productoption" }
            ]}
        ]
    }"#;

    async fn create_test_loader() -> (ContentLoader, Arc<DatabaseService>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = Arc::new(
            DatabaseService::new(temp_dir.path().join("content.db"))
                .await
                .unwrap(),
        );
        let loader = ContentLoader::new(Arc::clone(&db), Arc::new(FieldTypeRegistry::new()));
        (loader, db, temp_dir)
    }

    async fn store(db: &DatabaseService, field: &str, group: &str, seq: i64, data: &str, value: &str) {
        db.execute(
            "INSERT INTO page_content (page_id, field_name, group_name, sequence, data_name, value_string)
             VALUES (1, ?, ?, ?, ?, ?)",
            vec![
                Value::Text(field.to_string()),
                Value::Text(group.to_string()),
                Value::Integer(seq),
                Value::Text(data.to_string()),
                Value::Text(value.to_string()),
            ],
        )
        .await
        .unwrap();
    }

    fn product_page() -> Page {
        Page::new(1, "Shoe", Box::new(DefinedPageType::from_json(PRODUCT).unwrap()))
    }

    #[tokio::test]
    async fn test_plain_field_value() {
        let (loader, db, _temp) = create_test_loader().await;
        store(&db, "price", "", 0, "", "10.00").await;

        let content = loader.load(&product_page()).await.unwrap();
        assert_eq!(content.value("price"), Some("10.00"));
        assert_eq!(content.page_type(), "product");
    }

    #[tokio::test]
    async fn test_repeatable_group_synthesizes_missing_sequences() {
        let (loader, db, _temp) = create_test_loader().await;
        store(&db, "caption", "images", 0, "", "front").await;
        store(&db, "caption", "images", 2, "", "back").await;
        store(&db, "option", "images", 2, "name", "colour").await;

        let content = loader.load(&product_page()).await.unwrap();
        let images = content.get("images").unwrap().as_repeatable().unwrap();

        assert_eq!(images.len(), 3);
        assert_eq!(images.get(0).unwrap().value("caption"), Some("front"));
        assert_eq!(images.get(1).unwrap().value("caption"), None);
        assert_eq!(images.get(2).unwrap().value("caption"), Some("back"));
        assert_eq!(
            images.get(2).unwrap().get("option").unwrap().as_multiple().unwrap().get("name"),
            Some("colour")
        );
    }

    #[tokio::test]
    async fn test_multi_value_and_plain_group() {
        let (loader, db, _temp) = create_test_loader().await;
        store(&db, "cta", "", 0, "scope", "internal").await;
        store(&db, "cta", "", 0, "target", "/contact").await;
        store(&db, "weight", "specs", 0, "", "2kg").await;

        let content = loader.load(&product_page()).await.unwrap();
        let cta = content.get("cta").unwrap().as_multiple().unwrap();
        assert_eq!(cta.get("scope"), Some("internal"));
        assert_eq!(cta.get("target"), Some("/contact"));
        assert_eq!(
            content.get("specs").unwrap().as_group().unwrap().value("weight"),
            Some("2kg")
        );
    }

    #[tokio::test]
    async fn test_schema_drift_is_tolerated() {
        let (loader, db, _temp) = create_test_loader().await;
        store(&db, "colour", "", 0, "", "red").await;
        store(&db, "caption", "gallery", 0, "", "orphan").await;
        store(&db, "legacy", "images", 0, "", "x").await;
        store(&db, "price", "", 0, "", "5.00").await;

        let content = loader.load(&product_page()).await.unwrap();
        assert!(content.get("colour").is_none());
        assert!(content.get("gallery").is_none());
        assert_eq!(content.value("price"), Some("5.00"));
    }

    #[tokio::test]
    async fn test_rows_round_trip() {
        let (loader, db, _temp) = create_test_loader().await;
        store(&db, "price", "", 0, "", "10.00").await;
        store(&db, "cta", "", 0, "target", "/buy").await;
        store(&db, "caption", "images", 1, "", "side").await;

        let content = loader.load(&product_page()).await.unwrap();
        let rows = content_rows(&content);

        assert_eq!(
            rows,
            vec![
                row("price", "", 0, "", "10.00"),
                row("cta", "", 0, "target", "/buy"),
                row("caption", "images", 1, "", "side"),
            ]
        );
    }
}

//! Search Collaborator
//!
//! The page loader delegates term matching to a [`Searcher`], which returns
//! page ids in rank order. [`ContentSearcher`] is the built-in implementation:
//! it scores non-deleted, search-visible pages by term hits in the title
//! (weight 3) and in stored content values (weight 1).

use crate::db::DatabaseService;
use crate::models::PageCollection;
use anyhow::{Context, Result};
use async_trait::async_trait;
use libsql::Value;
use regex::Regex;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, OnceLock};

const TITLE_WEIGHT: u64 = 3;
const CONTENT_WEIGHT: u64 = 1;

const TERM_SEPARATOR_PATTERN: &str = r"[\s,]+";
static TERM_SEPARATOR_REGEX: OnceLock<Regex> = OnceLock::new();

#[async_trait]
pub trait Searcher: Debug + Send + Sync {
    /// Ids of pages matching `terms`, best match first
    ///
    /// Terms shorter than `min_term_length` characters are ignored.
    async fn ranked_ids(&self, terms: &[String], min_term_length: usize) -> Result<Vec<i64>>;

    /// Reorder `pages` to follow `ranked` without dropping any page
    fn sort_by_rank(&self, pages: &mut PageCollection, ranked: &[i64]) {
        pages.sort_by_ids(ranked);
    }
}

/// Split a raw search query on whitespace and commas
pub fn split_search_terms(query: &str) -> Vec<String> {
    let separator =
        TERM_SEPARATOR_REGEX.get_or_init(|| Regex::new(TERM_SEPARATOR_PATTERN).unwrap());

    separator
        .split(query.trim())
        .filter(|term| !term.is_empty())
        .map(str::to_string)
        .collect()
}

/// `LIKE`-based searcher over page titles and content values
#[derive(Debug, Clone)]
pub struct ContentSearcher {
    db: Arc<DatabaseService>,
}

impl ContentSearcher {
    pub fn new(db: Arc<DatabaseService>) -> Self {
        Self { db }
    }

    async fn hits(&self, sql: &str, pattern: &str) -> Result<Vec<i64>> {
        let ids = self
            .db
            .query_ids(sql, vec![Value::Text(pattern.to_string())])
            .await
            .context("search query failed")?;
        Ok(ids)
    }
}

#[async_trait]
impl Searcher for ContentSearcher {
    async fn ranked_ids(&self, terms: &[String], min_term_length: usize) -> Result<Vec<i64>> {
        let mut scores: HashMap<i64, u64> = HashMap::new();

        for term in terms {
            if term.chars().count() < min_term_length {
                continue;
            }
            let pattern = like_pattern(term);

            let title_hits = self
                .hits(
                    "SELECT page_id FROM page
                     WHERE deleted_at IS NULL AND visibility_search = 1
                       AND title LIKE ? ESCAPE '\\'",
                    &pattern,
                )
                .await?;
            for id in title_hits {
                *scores.entry(id).or_default() += TITLE_WEIGHT;
            }

            let content_hits = self
                .hits(
                    "SELECT DISTINCT page_content.page_id FROM page_content
                     JOIN page ON page.page_id = page_content.page_id
                     WHERE page.deleted_at IS NULL AND page.visibility_search = 1
                       AND page_content.value_string LIKE ? ESCAPE '\\'",
                    &pattern,
                )
                .await?;
            for id in content_hits {
                *scores.entry(id).or_default() += CONTENT_WEIGHT;
            }
        }

        let mut ranked: Vec<(i64, u64)> = scores.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        tracing::debug!(terms = terms.len(), matches = ranked.len(), "ranked search results");

        Ok(ranked.into_iter().map(|(id, _)| id).collect())
    }
}

/// `%term%` with LIKE wildcards in the term escaped
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_split_search_terms() {
        assert_eq!(
            split_search_terms("  red shoes,  leather ,,boots "),
            vec!["red", "shoes", "leather", "boots"]
        );
        assert!(split_search_terms("   ").is_empty());
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    async fn insert_page(db: &DatabaseService, id: i64, title: &str, visible: bool, deleted: bool) {
        db.execute(
            "INSERT INTO page (page_id, title, type, position_left, position_right, created_at,
                               visibility_search, deleted_at)
             VALUES (?, ?, 'basic', ?, ?, 0, ?, ?)",
            vec![
                Value::Integer(id),
                Value::Text(title.to_string()),
                Value::Integer(id * 2 - 1),
                Value::Integer(id * 2),
                Value::Integer(visible as i64),
                if deleted { Value::Integer(1) } else { Value::Null },
            ],
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_ranking_weights_title_over_content() {
        let temp_dir = TempDir::new().unwrap();
        let db = Arc::new(
            DatabaseService::new(temp_dir.path().join("search.db"))
                .await
                .unwrap(),
        );

        insert_page(&db, 1, "About us", true, false).await;
        insert_page(&db, 2, "Leather boots", true, false).await;
        insert_page(&db, 3, "Hidden boots", false, false).await;
        insert_page(&db, 4, "Deleted boots", true, true).await;
        db.execute(
            "INSERT INTO page_content (page_id, field_name, value_string) VALUES (1, 'body', 'we make boots')",
            vec![],
        )
        .await
        .unwrap();

        let searcher = ContentSearcher::new(Arc::clone(&db));
        let ranked = searcher
            .ranked_ids(&split_search_terms("boots, an"), 3)
            .await
            .unwrap();

        assert_eq!(ranked, vec![2, 1]);
    }
}

//! Nested-Set Page Loader
//!
//! Resolves pages by id, slug, type, tag, search terms and tree relation.
//! Every lookup first selects matching page ids with a plain query, then
//! materializes them through one shared path ([`PageLoader::get_by_ids`])
//! that binds rows to [`Page`] entities and applies the loader's filters.
//!
//! # Tree queries
//!
//! Tree relations are answered with nested-set arithmetic on
//! `position_left` / `position_right` / `position_depth`:
//!
//! - children of P: `left > P.left AND right < P.right AND depth = P.depth + 1`
//! - parent of P: `left < P.left AND right >= P.left AND depth = P.depth - 1`
//! - root of P: the depth-0 page whose range contains P
//!
//! A slug such as `/blog/hello-world` is resolved with a self-join per path
//! segment, each level strictly containing the previous one. The homepage
//! is `/`, so its descendants' paths leave out its own segment.
//!
//! # Materialization
//!
//! For each row, in order: drop deleted pages (unless included), build the
//! publish window and drop unpublished pages (unless included), resolve the
//! page type, give the left-most live top-level page the homepage slug `/`,
//! fill in authorship, inherit access from ancestors while it is negative,
//! resolve access groups, and finally drop pages the actor may not view
//! (unless included).

use crate::db::{DatabaseError, DatabaseService};
use crate::models::{
    Actor, Authorship, CommentSettings, DateRange, GroupDirectory, Page, PageCollection,
    PageTypeRegistry, Slug,
};
use crate::services::authorisation::Authorisation;
use crate::services::error::PageServiceError;
use crate::services::page_order::PageOrder;
use crate::services::searcher::Searcher;
use chrono::Utc;
use libsql::{Row, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Minimum search term length used when none is configured
pub const DEFAULT_SEARCH_MIN_TERM_LENGTH: usize = 3;

const PAGE_COLUMNS: &str = "
    page.page_id,
    page.title,
    page.type,
    page.slug,
    page.position_left,
    page.position_right,
    page.position_depth,
    page.publish_at,
    page.unpublish_at,
    page.created_at,
    page.created_by,
    page.updated_at,
    page.updated_by,
    page.deleted_at,
    page.deleted_by,
    page.meta_title,
    page.meta_description,
    page.meta_html_head,
    page.meta_html_foot,
    page.visibility_search,
    page.visibility_menu,
    page.visibility_aggregator,
    page.password,
    page.access,
    page.comment_enabled,
    page.comment_access,
    page.comment_approval,
    page.comment_expiry,
    GROUP_CONCAT(page_access_group.group_name, ',') AS access_groups";

/// One page of a paginated result (`page` is 1-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u64,
    pub per_page: u64,
}

impl Pagination {
    pub fn new(page: u64, per_page: u64) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.max(1),
        }
    }

    /// Number of results before this page; `None` when it does not fit in a `u64`
    pub fn offset(&self) -> Option<u64> {
        (self.page - 1).checked_mul(self.per_page)
    }

    /// Cut this page out of `pages`, recording how many there were in `total`
    ///
    /// An offset past the end, including one too large to address, gives an
    /// empty page.
    pub fn apply(&self, pages: PageCollection) -> PageCollection {
        let total = u64::try_from(pages.len()).unwrap_or(u64::MAX);
        let skip = self
            .offset()
            .and_then(|offset| usize::try_from(offset).ok())
            .unwrap_or(usize::MAX);
        let take = usize::try_from(self.per_page).unwrap_or(usize::MAX);

        let mut paged: PageCollection = pages.into_iter().skip(skip).take(take).collect();
        paged.total = Some(total);
        paged
    }
}

/// Options for [`PageLoader::get_by_search_terms`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchOptions {
    /// Overrides the loader's minimum term length
    pub min_term_length: Option<usize>,
    /// Results per page; unpaginated when `None`
    pub per_page: Option<u64>,
}

/// Loads pages from the nested-set page table
///
/// Filters and ordering are set with consuming builder methods, so a
/// configured loader is a separate value:
///
/// ```no_run
/// # use pagespace_core::services::{PageLoader, PageOrder};
/// # async fn example(loader: &PageLoader) -> Result<(), Box<dyn std::error::Error>> {
/// let newest_first = loader
///     .clone()
///     .include_unpublished(false)
///     .order_by(PageOrder::CreatedDateReverse);
/// let news = newest_first.get_by_tag("news").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct PageLoader {
    db: Arc<DatabaseService>,
    page_types: Arc<PageTypeRegistry>,
    groups: Arc<dyn GroupDirectory>,
    authorisation: Arc<dyn Authorisation>,
    searcher: Arc<dyn Searcher>,
    actor: Actor,
    include_deleted: bool,
    include_unpublished: bool,
    include_unviewable: bool,
    order: PageOrder,
    /// Taken by the next plural lookup
    pagination: Arc<Mutex<Option<Pagination>>>,
    search_min_term_length: usize,
}

impl PageLoader {
    pub fn new(
        db: Arc<DatabaseService>,
        page_types: Arc<PageTypeRegistry>,
        groups: Arc<dyn GroupDirectory>,
        authorisation: Arc<dyn Authorisation>,
        searcher: Arc<dyn Searcher>,
    ) -> Self {
        Self {
            db,
            page_types,
            groups,
            authorisation,
            searcher,
            actor: Actor::guest(),
            include_deleted: false,
            include_unpublished: true,
            include_unviewable: true,
            order: PageOrder::Standard,
            pagination: Arc::new(Mutex::new(None)),
            search_min_term_length: DEFAULT_SEARCH_MIN_TERM_LENGTH,
        }
    }

    //
    // CONFIGURATION
    //

    pub fn for_actor(mut self, actor: Actor) -> Self {
        self.actor = actor;
        self
    }

    pub fn include_deleted(mut self, include: bool) -> Self {
        self.include_deleted = include;
        self
    }

    pub fn include_unpublished(mut self, include: bool) -> Self {
        self.include_unpublished = include;
        self
    }

    pub fn include_unviewable(mut self, include: bool) -> Self {
        self.include_unviewable = include;
        self
    }

    pub fn order_by(mut self, order: PageOrder) -> Self {
        self.order = order;
        self
    }

    /// Limit the next plural lookup to one page of results
    ///
    /// The pagination is used up by that lookup; later lookups on the same
    /// loader return every matching page again.
    pub fn paginate(mut self, pagination: Pagination) -> Self {
        self.pagination = Arc::new(Mutex::new(Some(pagination)));
        self
    }

    fn take_pagination(&self) -> Option<Pagination> {
        match self.pagination.lock() {
            Ok(mut pagination) => pagination.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    pub fn with_search_min_term_length(mut self, length: usize) -> Self {
        self.search_min_term_length = length;
        self
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    pub fn page_types(&self) -> &PageTypeRegistry {
        &self.page_types
    }

    /// A copy of this loader that returns every stored page
    pub fn unfiltered(&self) -> Self {
        self.clone()
            .include_deleted(true)
            .include_unpublished(true)
            .include_unviewable(true)
    }

    //
    // LOOKUPS
    //

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Page>, PageServiceError> {
        Ok(self.load(&[id], false).await?.into_iter().next())
    }

    /// Load several pages; ids that are missing or filtered out are dropped
    pub async fn get_by_ids(&self, ids: &[i64]) -> Result<PageCollection, PageServiceError> {
        self.load(ids, true).await
    }

    /// The left-most live top-level page
    pub async fn get_homepage(&self) -> Result<Option<Page>, PageServiceError> {
        match self.homepage_id().await? {
            Some(id) => self.get_by_id(id).await,
            None => Ok(None),
        }
    }

    async fn homepage_id(&self) -> Result<Option<i64>, PageServiceError> {
        Ok(self
            .db
            .query_scalar(
                "SELECT page_id FROM page
                 WHERE deleted_at IS NULL AND position_depth = 0
                 ORDER BY position_left
                 LIMIT 1",
                vec![],
            )
            .await?)
    }

    /// Resolve a full slug path, falling back to the slug history
    ///
    /// A path is matched from the top level first; pages below the homepage
    /// are also reachable without the homepage's own segment.
    pub async fn get_by_slug(
        &self,
        slug: &str,
        check_history: bool,
    ) -> Result<Option<Page>, PageServiceError> {
        let path = slug.trim().trim_matches('/');
        if path.is_empty() {
            return self.get_homepage().await;
        }

        let mut parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        parts.reverse();

        let mut id = self.find_slug_path(&parts, None).await?;
        if id.is_none() {
            if let Some(homepage) = self.homepage_id().await? {
                id = self.find_slug_path(&parts, Some(homepage)).await?;
            }
        }

        if let Some(id) = id {
            return self.get_by_id(id).await;
        }

        if check_history {
            return self.check_slug_history(slug).await;
        }

        Ok(None)
    }

    /// Self-join one level per segment (`parts` is leaf first)
    ///
    /// The outermost segment is a top-level page, or a child of `under`.
    async fn find_slug_path(
        &self,
        parts: &[&str],
        under: Option<i64>,
    ) -> Result<Option<i64>, PageServiceError> {
        let levels = parts.len();
        let leaf_depth = levels as i64 - 1 + i64::from(under.is_some());

        let mut joins = String::new();
        let mut conditions = String::new();
        let mut params = vec![Value::Text(parts[0].to_string()), Value::Integer(leaf_depth)];

        for (i, segment) in parts.iter().enumerate().skip(1) {
            joins.push_str(&containing_level(i + 1));
            conditions.push_str(&format!(
                " AND level{level}.slug = ? AND level{level}.deleted_at IS NULL",
                level = i + 1
            ));
            params.push(Value::Text(segment.to_string()));
        }

        match under {
            Some(root_id) => {
                joins.push_str(&containing_level(levels + 1));
                conditions.push_str(&format!(" AND level{}.page_id = ?", levels + 1));
                params.push(Value::Integer(root_id));
            }
            None if levels > 1 => {
                conditions.push_str(&format!(" AND level{}.position_depth = 0", levels));
            }
            None => {}
        }

        let sql = format!(
            "SELECT level1.page_id FROM page level1{joins}
             WHERE level1.slug = ? AND level1.position_depth = ? AND level1.deleted_at IS NULL{conditions}
             LIMIT 1",
            joins = joins,
            conditions = conditions
        );

        Ok(self.db.query_scalar(&sql, params).await?)
    }

    pub async fn get_parent(&self, page: &Page) -> Result<Option<Page>, PageServiceError> {
        if page.depth == 0 {
            return Ok(None);
        }

        let id = self
            .db
            .query_scalar(
                "SELECT page_id FROM page
                 WHERE position_left < ? AND position_right >= ? AND position_depth = ?",
                vec![
                    Value::Integer(page.left),
                    Value::Integer(page.left),
                    Value::Integer(page.depth - 1),
                ],
            )
            .await?;

        match id {
            Some(id) => self.get_by_id(id).await,
            None => Ok(None),
        }
    }

    /// The top-level ancestor of `page`, or `page` itself at depth 0
    pub async fn get_root(&self, page: &Page) -> Result<Option<Page>, PageServiceError> {
        if page.depth == 0 {
            return Ok(Some(page.clone()));
        }

        let id = self
            .db
            .query_scalar(
                "SELECT page_id FROM page
                 WHERE position_left < ? AND position_right >= ? AND position_depth = 0",
                vec![Value::Integer(page.left), Value::Integer(page.right)],
            )
            .await?;

        match id {
            Some(id) => self.get_by_id(id).await,
            None => Ok(None),
        }
    }

    /// Find the page a historical slug used to point at
    pub async fn check_slug_history(&self, slug: &str) -> Result<Option<Page>, PageServiceError> {
        let slug = format!("/{}", slug.trim().trim_matches('/'));

        let id = self
            .db
            .query_scalar(
                "SELECT page_id FROM page_slug_history WHERE slug = ?",
                vec![Value::Text(slug)],
            )
            .await?;

        match id {
            Some(id) => self.get_by_id(id).await,
            None => Ok(None),
        }
    }

    pub async fn get_by_type(&self, page_type: &str) -> Result<PageCollection, PageServiceError> {
        let ids = self
            .db
            .query_ids(
                "SELECT page_id FROM page WHERE LOWER(type) = LOWER(?)",
                vec![Value::Text(page_type.to_string())],
            )
            .await?;
        self.get_by_ids(&ids).await
    }

    pub async fn get_by_tag(&self, tag: &str) -> Result<PageCollection, PageServiceError> {
        let ids = self
            .db
            .query_ids(
                "SELECT page_id FROM page_tag WHERE tag_name = ?",
                vec![Value::Text(tag.to_string())],
            )
            .await?;
        self.get_by_ids(&ids).await
    }

    pub async fn get_all(&self) -> Result<PageCollection, PageServiceError> {
        let ids = self.db.query_ids("SELECT page_id FROM page", vec![]).await?;
        self.get_by_ids(&ids).await
    }

    pub async fn get_top_level(&self) -> Result<PageCollection, PageServiceError> {
        self.get_children(None).await
    }

    /// Direct children of `page`, or the top-level pages for `None`
    pub async fn get_children(&self, page: Option<&Page>) -> Result<PageCollection, PageServiceError> {
        let (left, right, depth) = match page {
            Some(p) => (p.left, p.right, p.depth),
            None => (0, i64::MAX, -1),
        };

        let ids = self
            .db
            .query_ids(
                "SELECT page_id FROM page
                 WHERE position_left > ? AND position_right < ? AND position_depth = ?",
                vec![
                    Value::Integer(left),
                    Value::Integer(right),
                    Value::Integer(depth + 1),
                ],
            )
            .await?;
        self.get_by_ids(&ids).await
    }

    /// Pages sharing `page`'s parent
    pub async fn get_siblings(
        &self,
        page: &Page,
        include_request_page: bool,
    ) -> Result<PageCollection, PageServiceError> {
        let mut ids = if page.depth == 0 {
            self.db
                .query_ids(
                    "SELECT page_id FROM page WHERE position_depth = 0 AND page_id <> ?",
                    vec![Value::Integer(page.id)],
                )
                .await?
        } else {
            self.db
                .query_ids(
                    "SELECT children.page_id
                     FROM page AS parent
                     JOIN page AS children ON (
                        children.position_left > parent.position_left
                        AND children.position_right < parent.position_right
                        AND children.position_depth = ?
                     )
                     WHERE parent.position_left < ?
                       AND parent.position_right > ?
                       AND parent.position_depth = ?
                       AND children.page_id <> ?",
                    vec![
                        Value::Integer(page.depth),
                        Value::Integer(page.left),
                        Value::Integer(page.right),
                        Value::Integer(page.depth - 1),
                        Value::Integer(page.id),
                    ],
                )
                .await?
        };

        if include_request_page {
            ids.push(page.id);
        }

        let mut siblings = self.get_by_ids(&ids).await?;
        if include_request_page && !siblings.contains(page.id) {
            siblings.push(page.clone());
        }
        Ok(siblings)
    }

    /// Search pages through the searcher collaborator
    ///
    /// Pages the actor may not view, or that are not published, are removed
    /// after ranking; the remaining pages keep the searcher's rank order.
    pub async fn get_by_search_terms(
        &self,
        terms: &[String],
        page: u64,
        options: SearchOptions,
    ) -> Result<PageCollection, PageServiceError> {
        let min_length = options
            .min_term_length
            .unwrap_or(self.search_min_term_length);

        let ranked = self
            .searcher
            .ranked_ids(terms, min_length)
            .await
            .map_err(|e| PageServiceError::search(format!("{:#}", e)))?;

        if ranked.is_empty() {
            return Ok(PageCollection::default());
        }

        let mut results = self.load(&ranked, false).await?;
        results.retain(|p| {
            self.authorisation.is_viewable(p, &self.actor) && self.authorisation.is_published(p)
        });
        self.searcher.sort_by_rank(&mut results, &ranked);

        if let Some(per_page) = options.per_page {
            return Ok(Pagination::new(page, per_page).apply(results));
        }

        Ok(results)
    }

    //
    // MATERIALIZATION
    //

    /// Load the pages with the given ids, applying filters and ordering
    ///
    /// Pagination, when attached, is only applied to plural lookups, after
    /// every filter has run.
    async fn load(&self, ids: &[i64], paginate: bool) -> Result<PageCollection, PageServiceError> {
        let pagination = if paginate { self.take_pagination() } else { None };
        if ids.is_empty() {
            return Ok(paged(pagination, PageCollection::default()));
        }

        let id_list = placeholders(ids.len());
        let id_params: Vec<Value> = ids.iter().map(|id| Value::Integer(*id)).collect();
        let deleted_filter = if self.include_deleted {
            ""
        } else {
            " AND page.deleted_at IS NULL"
        };

        let sql = format!(
            "SELECT {columns}
             FROM page
             LEFT JOIN page_access_group ON page_access_group.page_id = page.page_id
             WHERE page.page_id IN ({ids}){deleted}
             GROUP BY page.page_id
             ORDER BY {order}",
            columns = PAGE_COLUMNS,
            ids = id_list,
            deleted = deleted_filter,
            order = self.order.order_clause()
        );

        let conn = self.db.connect_with_timeout().await?;
        let mut rows = conn
            .query(&sql, id_params)
            .await
            .map_err(|e| PageServiceError::query_failed(format!("Failed to load pages: {}", e)))?;

        let mut page_rows = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| PageServiceError::query_failed(format!("Failed to fetch row: {}", e)))?
        {
            page_rows.push(PageRow::from_row(&row)?);
        }

        if page_rows.is_empty() {
            return Ok(paged(pagination, PageCollection::default()));
        }

        let loaded_ids: Vec<i64> = page_rows.iter().map(|r| r.id).collect();
        let min_left = self
            .db
            .query_scalar(
                "SELECT MIN(position_left) FROM page WHERE deleted_at IS NULL AND position_depth = 0",
                vec![],
            )
            .await?;
        let mut ancestor_slugs = self.ancestor_slugs(&loaded_ids, min_left).await?;
        let mut tags = self.tags(&loaded_ids).await?;

        let now = Utc::now();
        let mut pages = Vec::with_capacity(page_rows.len());

        for row in page_rows {
            if row.deleted_at.is_some() && !self.include_deleted {
                continue;
            }

            let publish_date_range = DateRange::from_epochs(row.publish_at, row.unpublish_at);
            if !self.include_unpublished && !publish_date_range.is_in_range(now) {
                continue;
            }

            let page_type = self
                .page_types
                .get(&row.page_type)
                .ok_or_else(|| PageServiceError::unknown_page_type(row.id, &row.page_type))?;

            let slug = if Some(row.left) == min_left {
                Slug::root()
            } else {
                let mut segments = ancestor_slugs.remove(&row.id).unwrap_or_default();
                segments.push(row.slug.clone());
                Slug::new(segments)
            };

            let mut authorship = Authorship::default();
            if let Some(at) = crate::models::from_epoch(row.created_at) {
                authorship.create(at, row.created_by);
            }
            if let Some(at) = crate::models::from_epoch(row.updated_at) {
                authorship.update(at, row.updated_by);
            }
            if let Some(at) = crate::models::from_epoch(row.deleted_at) {
                authorship.delete(at, row.deleted_by);
            }

            let (access, group_names, access_inherited) = self.resolve_access(&row).await?;

            let mut page = Page::new(row.id, &row.title, page_type);
            page.slug = slug;
            page.left = row.left;
            page.right = row.right;
            page.depth = row.depth;
            page.publish_date_range = publish_date_range;
            page.authorship = authorship;
            page.meta_title = row.meta_title;
            page.meta_description = row.meta_description;
            page.meta_html_head = row.meta_html_head;
            page.meta_html_foot = row.meta_html_foot;
            page.visibility_search = row.visibility_search != 0;
            page.visibility_menu = row.visibility_menu != 0;
            page.visibility_aggregator = row.visibility_aggregator != 0;
            page.password = row.password;
            page.access = access;
            page.access_inherited = access_inherited;
            page.access_groups = group_names
                .as_deref()
                .map(|names| self.resolve_groups(names))
                .unwrap_or_default();
            page.tags = tags.remove(&row.id).unwrap_or_default().into_iter().collect();
            page.comments = CommentSettings {
                enabled: row.comment_enabled != 0,
                access: row.comment_access,
                approval: row.comment_approval != 0,
                expiry: row.comment_expiry,
            };

            if !self.include_unviewable && !self.authorisation.is_viewable(&page, &self.actor) {
                continue;
            }

            pages.push(page);
        }

        tracing::debug!(requested = ids.len(), loaded = pages.len(), "loaded pages");

        Ok(paged(pagination, PageCollection::new(pages)))
    }

    /// Walk up the tree while access is negative
    ///
    /// Returns the effective access (floored at 0), the comma-joined access
    /// group names that came with it, and whether it was inherited. The walk
    /// stops at a page without a parent.
    async fn resolve_access(
        &self,
        row: &PageRow,
    ) -> Result<(i64, Option<String>, bool), PageServiceError> {
        let mut access = row.access;
        let mut groups = row.access_groups.clone();
        let mut inherited = false;
        let (mut left, mut depth) = (row.left, row.depth);

        if access < 0 {
            let conn = self.db.connect_with_timeout().await?;
            while access < 0 {
                let mut rows = conn
                    .query(
                        "SELECT page.access, page.position_left, page.position_depth,
                                GROUP_CONCAT(page_access_group.group_name, ',')
                         FROM page
                         LEFT JOIN page_access_group ON page_access_group.page_id = page.page_id
                         WHERE page.position_left < ? AND page.position_right >= ?
                           AND page.position_depth = ?
                         GROUP BY page.page_id",
                        vec![
                            Value::Integer(left),
                            Value::Integer(left),
                            Value::Integer(depth - 1),
                        ],
                    )
                    .await
                    .map_err(|e| {
                        PageServiceError::query_failed(format!("Failed to load parent access: {}", e))
                    })?;

                let Some(parent) = rows.next().await.map_err(DatabaseError::from)? else {
                    tracing::warn!(page_id = row.id, "access inheritance reached a page without parent");
                    break;
                };

                access = parent.get::<i64>(0).map_err(DatabaseError::from)?;
                left = parent.get::<i64>(1).map_err(DatabaseError::from)?;
                depth = parent.get::<i64>(2).map_err(DatabaseError::from)?;
                groups = parent.get::<Option<String>>(3).map_err(DatabaseError::from)?;
                inherited = true;
            }
        }

        Ok((access.max(0), groups, inherited))
    }

    /// Resolve comma-joined group names; unknown names are dropped
    fn resolve_groups(&self, names: &str) -> std::collections::BTreeMap<String, crate::models::UserGroup> {
        names
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .filter_map(|name| self.groups.get(name))
            .map(|group| (group.name.clone(), group))
            .collect()
    }

    /// Slug segments of every ancestor of each page, outermost first
    ///
    /// The homepage (the page at `homepage_left`) contributes no segment.
    async fn ancestor_slugs(
        &self,
        ids: &[i64],
        homepage_left: Option<i64>,
    ) -> Result<HashMap<i64, Vec<String>>, PageServiceError> {
        let mut params: Vec<Value> = ids.iter().map(|id| Value::Integer(*id)).collect();
        let homepage_filter = match homepage_left {
            Some(left) => {
                params.push(Value::Integer(left));
                " AND ancestor.position_left <> ?"
            }
            None => "",
        };

        let sql = format!(
            "SELECT page.page_id, ancestor.slug
             FROM page
             JOIN page AS ancestor
               ON ancestor.position_left < page.position_left
              AND ancestor.position_right > page.position_right
             WHERE page.page_id IN ({}){}
             ORDER BY page.page_id, ancestor.position_depth",
            placeholders(ids.len()),
            homepage_filter
        );
        self.grouped_strings(&sql, params).await
    }

    async fn tags(&self, ids: &[i64]) -> Result<HashMap<i64, Vec<String>>, PageServiceError> {
        let sql = format!(
            "SELECT page_id, tag_name FROM page_tag WHERE page_id IN ({}) ORDER BY page_id, tag_name",
            placeholders(ids.len())
        );
        let params = ids.iter().map(|id| Value::Integer(*id)).collect();
        self.grouped_strings(&sql, params).await
    }

    /// Run an `(id, text)` query and group the text column by id
    async fn grouped_strings(
        &self,
        sql: &str,
        params: Vec<Value>,
    ) -> Result<HashMap<i64, Vec<String>>, PageServiceError> {
        let conn = self.db.connect_with_timeout().await?;
        let mut rows = conn
            .query(sql, params)
            .await
            .map_err(|e| PageServiceError::query_failed(format!("Failed to execute query: {}", e)))?;

        let mut grouped: HashMap<i64, Vec<String>> = HashMap::new();
        while let Some(row) = rows.next().await.map_err(DatabaseError::from)? {
            let id = row.get::<i64>(0).map_err(DatabaseError::from)?;
            let value = row.get::<String>(1).map_err(DatabaseError::from)?;
            grouped.entry(id).or_default().push(value);
        }
        Ok(grouped)
    }
}

fn paged(pagination: Option<Pagination>, pages: PageCollection) -> PageCollection {
    match pagination {
        Some(pagination) => pagination.apply(pages),
        None => pages,
    }
}

/// Join clause for a slug level strictly containing the level below it
fn containing_level(level: usize) -> String {
    format!(
        " JOIN page level{level} ON (level{level}.position_left < level{prev}.position_left \
         AND level{level}.position_right > level{prev}.position_right)",
        level = level,
        prev = level - 1
    )
}

/// `?, ?, ?` for an `IN (...)` list
fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// Raw `page` row, as selected by [`PAGE_COLUMNS`]
#[derive(Debug)]
struct PageRow {
    id: i64,
    title: String,
    page_type: String,
    slug: String,
    left: i64,
    right: i64,
    depth: i64,
    publish_at: Option<i64>,
    unpublish_at: Option<i64>,
    created_at: Option<i64>,
    created_by: Option<i64>,
    updated_at: Option<i64>,
    updated_by: Option<i64>,
    deleted_at: Option<i64>,
    deleted_by: Option<i64>,
    meta_title: Option<String>,
    meta_description: Option<String>,
    meta_html_head: Option<String>,
    meta_html_foot: Option<String>,
    visibility_search: i64,
    visibility_menu: i64,
    visibility_aggregator: i64,
    password: Option<String>,
    access: i64,
    comment_enabled: i64,
    comment_access: i64,
    comment_approval: i64,
    comment_expiry: Option<i64>,
    access_groups: Option<String>,
}

impl PageRow {
    fn from_row(row: &Row) -> Result<Self, DatabaseError> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            page_type: row.get(2)?,
            slug: row.get(3)?,
            left: row.get(4)?,
            right: row.get(5)?,
            depth: row.get(6)?,
            publish_at: row.get(7)?,
            unpublish_at: row.get(8)?,
            created_at: row.get(9)?,
            created_by: row.get(10)?,
            updated_at: row.get(11)?,
            updated_by: row.get(12)?,
            deleted_at: row.get(13)?,
            deleted_by: row.get(14)?,
            meta_title: row.get(15)?,
            meta_description: row.get(16)?,
            meta_html_head: row.get(17)?,
            meta_html_foot: row.get(18)?,
            visibility_search: row.get(19)?,
            visibility_menu: row.get(20)?,
            visibility_aggregator: row.get(21)?,
            password: row.get(22)?,
            access: row.get(23)?,
            comment_enabled: row.get(24)?,
            comment_access: row.get(25)?,
            comment_approval: row.get(26)?,
            comment_expiry: row.get(27)?,
            access_groups: row.get(28)?,
        })
    }
}

#[cfg(test)]
#[path = "page_loader_test.rs"]
mod page_loader_test;

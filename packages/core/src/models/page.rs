//! Page Entity
//!
//! A page is a node in the site tree, stored as a nested set: every page
//! carries `left`/`right`/`depth` coordinates such that a descendant's
//! interval lies strictly inside its ancestor's interval.
//!
//! Only the last slug segment is persisted; [`Slug`] holds the full path
//! rebuilt from the ancestor chain when the page is loaded.

use crate::models::page_type::PageType;
use crate::models::user::UserGroup;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Sentinel stored on `access` meaning "inherit from the parent page"
pub const ACCESS_INHERIT: i64 = -100;

/// Full URL path of a page, as segments
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Slug {
    segments: Vec<String>,
}

impl Slug {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments
                .into_iter()
                .map(Into::into)
                .filter(|s: &String| !s.is_empty())
                .collect(),
        }
    }

    /// The homepage slug `/`
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a path such as `/blog/hello-world` (leading slash optional)
    pub fn from_path(path: &str) -> Self {
        Self::new(path.split('/'))
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn last_segment(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Path with a leading slash; `/` for the root
    pub fn full(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Same path with the last segment replaced
    pub fn with_last_segment(&self, segment: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.pop();
        segments.push(segment.to_string());
        Self::new(segments)
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full())
    }
}

/// Publish window; an absent bound is unbounded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    /// Build a range from nullable epoch-second columns
    pub fn from_epochs(start: Option<i64>, end: Option<i64>) -> Self {
        Self {
            start: from_epoch(start),
            end: from_epoch(end),
        }
    }

    /// True when `now` is at or after the start and before the end
    pub fn is_in_range(&self, now: DateTime<Utc>) -> bool {
        self.start.map_or(true, |start| start <= now) && self.end.map_or(true, |end| now < end)
    }
}

/// Who created, last updated and deleted a page, and when
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorship {
    pub created_at: Option<DateTime<Utc>>,
    pub created_by: Option<i64>,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<i64>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<i64>,
}

impl Authorship {
    pub fn create(&mut self, at: DateTime<Utc>, by: Option<i64>) {
        self.created_at = Some(at);
        self.created_by = by;
    }

    pub fn update(&mut self, at: DateTime<Utc>, by: Option<i64>) {
        self.updated_at = Some(at);
        self.updated_by = by;
    }

    pub fn delete(&mut self, at: DateTime<Utc>, by: Option<i64>) {
        self.deleted_at = Some(at);
        self.deleted_by = by;
    }

    pub fn restore(&mut self) {
        self.deleted_at = None;
        self.deleted_by = None;
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Comment settings of a page
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentSettings {
    pub enabled: bool,
    /// Minimum access level required to comment
    pub access: i64,
    /// Comments wait for moderation before they are shown
    pub approval: bool,
    /// Days after publication that comments stay open; `None` never expires
    pub expiry: Option<i64>,
}

/// A page in the site tree
#[derive(Debug, Clone)]
pub struct Page {
    pub id: i64,
    pub title: String,
    pub page_type: Box<dyn PageType>,
    pub slug: Slug,

    pub left: i64,
    pub right: i64,
    pub depth: i64,

    pub publish_date_range: DateRange,
    pub authorship: Authorship,

    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub meta_html_head: Option<String>,
    pub meta_html_foot: Option<String>,

    pub visibility_search: bool,
    pub visibility_menu: bool,
    pub visibility_aggregator: bool,

    pub password: Option<String>,
    /// Effective access level (negative values only before inheritance)
    pub access: i64,
    pub access_groups: BTreeMap<String, UserGroup>,
    /// Set by the loader when `access` came from an ancestor
    pub access_inherited: bool,

    pub tags: BTreeSet<String>,
    pub comments: CommentSettings,
}

impl Page {
    /// An unpositioned page with default settings
    pub fn new(id: i64, title: &str, page_type: Box<dyn PageType>) -> Self {
        Self {
            id,
            title: title.to_string(),
            page_type,
            slug: Slug::default(),
            left: 0,
            right: 0,
            depth: 0,
            publish_date_range: DateRange::default(),
            authorship: Authorship::default(),
            meta_title: None,
            meta_description: None,
            meta_html_head: None,
            meta_html_foot: None,
            visibility_search: true,
            visibility_menu: true,
            visibility_aggregator: true,
            password: None,
            access: 0,
            access_groups: BTreeMap::new(),
            access_inherited: false,
            tags: BTreeSet::new(),
            comments: CommentSettings::default(),
        }
    }

    pub fn page_type(&self) -> &dyn PageType {
        self.page_type.as_ref()
    }

    pub fn is_homepage(&self) -> bool {
        self.slug.is_root()
    }

    pub fn has_children(&self) -> bool {
        self.right - self.left > 1
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    pub fn set_tags<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
    }

    pub fn is_deleted(&self) -> bool {
        self.authorship.is_deleted()
    }

    pub fn is_published_at(&self, now: DateTime<Utc>) -> bool {
        self.publish_date_range.is_in_range(now)
    }

    /// Replace the publish window: open-ended from `now`, or closed at `now`
    pub fn set_published(&mut self, publish: bool, now: DateTime<Utc>) {
        self.publish_date_range = if publish {
            DateRange::new(Some(now), None)
        } else {
            DateRange::new(Some(now), Some(now))
        };
    }

    pub fn access_group_names(&self) -> impl Iterator<Item = &str> {
        self.access_groups.keys().map(String::as_str)
    }
}

impl PartialEq for Page {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.title == other.title
            && self.page_type.name() == other.page_type.name()
            && self.slug == other.slug
            && self.left == other.left
            && self.right == other.right
            && self.depth == other.depth
            && self.publish_date_range == other.publish_date_range
            && self.authorship == other.authorship
            && self.meta_title == other.meta_title
            && self.meta_description == other.meta_description
            && self.meta_html_head == other.meta_html_head
            && self.meta_html_foot == other.meta_html_foot
            && self.visibility_search == other.visibility_search
            && self.visibility_menu == other.visibility_menu
            && self.visibility_aggregator == other.visibility_aggregator
            && self.password == other.password
            && self.access == other.access
            && self.access_groups == other.access_groups
            && self.access_inherited == other.access_inherited
            && self.tags == other.tags
            && self.comments == other.comments
    }
}

/// Ordered set of loaded pages
///
/// `total` is set when the collection is one page of a paginated result and
/// holds the number of matches before pagination.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageCollection {
    pages: Vec<Page>,
    pub total: Option<u64>,
}

impl PageCollection {
    pub fn new(pages: Vec<Page>) -> Self {
        Self { pages, total: None }
    }

    pub fn get(&self, id: i64) -> Option<&Page> {
        self.pages.iter().find(|p| p.id == id)
    }

    pub fn contains(&self, id: i64) -> bool {
        self.get(id).is_some()
    }

    pub fn ids(&self) -> Vec<i64> {
        self.pages.iter().map(|p| p.id).collect()
    }

    pub fn first(&self) -> Option<&Page> {
        self.pages.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Page> {
        self.pages.iter()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn push(&mut self, page: Page) {
        self.pages.push(page);
    }

    /// Keep only the pages matching `keep`
    pub fn retain<F>(&mut self, keep: F)
    where
        F: FnMut(&Page) -> bool,
    {
        self.pages.retain(keep);
    }

    /// Reorder so that pages appear in the order of `ids`
    ///
    /// Pages whose id is not listed keep their relative order at the end.
    pub fn sort_by_ids(&mut self, ids: &[i64]) {
        let rank = |id: i64| ids.iter().position(|&i| i == id).unwrap_or(usize::MAX);
        self.pages.sort_by_key(|p| rank(p.id));
    }

    pub fn into_vec(self) -> Vec<Page> {
        self.pages
    }
}

impl IntoIterator for PageCollection {
    type Item = Page;
    type IntoIter = std::vec::IntoIter<Page>;

    fn into_iter(self) -> Self::IntoIter {
        self.pages.into_iter()
    }
}

impl<'a> IntoIterator for &'a PageCollection {
    type Item = &'a Page;
    type IntoIter = std::slice::Iter<'a, Page>;

    fn into_iter(self) -> Self::IntoIter {
        self.pages.iter()
    }
}

impl FromIterator<Page> for PageCollection {
    fn from_iter<T: IntoIterator<Item = Page>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Convert a nullable epoch-seconds column into a timestamp
pub fn from_epoch(secs: Option<i64>) -> Option<DateTime<Utc>> {
    secs.and_then(|s| DateTime::from_timestamp(s, 0))
}

/// Convert a timestamp into an epoch-seconds column value
pub fn to_epoch(at: Option<DateTime<Utc>>) -> Option<i64> {
    at.map(|dt| dt.timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::page_type::DefinedPageType;
    use chrono::Duration;

    fn page(left: i64, right: i64) -> Page {
        let mut page = Page::new(1, "About", Box::new(DefinedPageType::named("basic")));
        page.left = left;
        page.right = right;
        page
    }

    #[test]
    fn test_slug() {
        let slug = Slug::from_path("/blog/hello-world/");
        assert_eq!(slug.segments(), ["blog", "hello-world"]);
        assert_eq!(slug.full(), "/blog/hello-world");
        assert_eq!(slug.last_segment(), Some("hello-world"));
        assert_eq!(slug.with_last_segment("goodbye").full(), "/blog/goodbye");

        assert!(Slug::from_path("/").is_root());
        assert_eq!(Slug::root().to_string(), "/");
    }

    #[test]
    fn test_date_range_unbounded_sides() {
        let now = Utc::now();
        let hour = Duration::hours(1);

        assert!(DateRange::default().is_in_range(now));
        assert!(DateRange::new(Some(now - hour), None).is_in_range(now));
        assert!(!DateRange::new(Some(now + hour), None).is_in_range(now));
        assert!(DateRange::new(None, Some(now + hour)).is_in_range(now));
        assert!(!DateRange::new(None, Some(now - hour)).is_in_range(now));
        assert!(!DateRange::new(Some(now), Some(now)).is_in_range(now));
    }

    #[test]
    fn test_has_children() {
        assert!(!page(3, 4).has_children());
        assert!(page(2, 5).has_children());
    }

    #[test]
    fn test_set_published() {
        let now = Utc::now();
        let mut page = page(1, 2);

        page.set_published(false, now);
        assert!(!page.is_published_at(now));

        page.set_published(true, now);
        assert!(page.is_published_at(now));
        assert_eq!(page.publish_date_range.end, None);
    }

    #[test]
    fn test_tags() {
        let mut page = page(1, 2);
        page.set_tags(["news", "featured"]);
        assert!(page.has_tag("news"));
        assert!(!page.has_tag("archive"));
    }

    #[test]
    fn test_collection_sort_by_ids() {
        let mut collection: PageCollection = [3, 1, 2]
            .into_iter()
            .map(|id| {
                let mut p = page(1, 2);
                p.id = id;
                p
            })
            .collect();

        collection.sort_by_ids(&[2, 3]);
        assert_eq!(collection.ids(), vec![2, 3, 1]);
        assert_eq!(collection.get(3).unwrap().id, 3);
        assert!(collection.get(9).is_none());
    }
}

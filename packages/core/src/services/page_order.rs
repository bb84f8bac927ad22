//! Page ordering strategies for the page loader

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Contributes a custom `ORDER BY` clause (without the keyword)
///
/// Columns of the `page` table are available under the `page` alias.
pub trait OrderStatement: fmt::Debug + Send + Sync {
    fn order_clause(&self) -> String;
}

/// How the page loader sorts its results
#[derive(Debug, Clone, Default)]
pub enum PageOrder {
    /// Tree position, top to bottom
    #[default]
    Standard,
    /// Tree position, bottom to top
    Reverse,
    Id,
    IdReverse,
    CreatedDate,
    CreatedDateReverse,
    UpdatedDate,
    UpdatedDateReverse,
    Custom(Arc<dyn OrderStatement>),
}

impl PageOrder {
    pub fn order_clause(&self) -> String {
        let clause = match self {
            PageOrder::Standard => "page.position_left ASC",
            PageOrder::Reverse => "page.position_left DESC",
            PageOrder::Id => "page.page_id ASC",
            PageOrder::IdReverse => "page.page_id DESC",
            PageOrder::CreatedDate => "page.created_at ASC, page.page_id ASC",
            PageOrder::CreatedDateReverse => "page.created_at DESC, page.page_id DESC",
            PageOrder::UpdatedDate => "page.updated_at ASC, page.page_id ASC",
            PageOrder::UpdatedDateReverse => "page.updated_at DESC, page.page_id DESC",
            PageOrder::Custom(statement) => return statement.order_clause(),
        };
        clause.to_string()
    }

    pub fn name(&self) -> &'static str {
        match self {
            PageOrder::Standard => "standard",
            PageOrder::Reverse => "reverse",
            PageOrder::Id => "id",
            PageOrder::IdReverse => "id_reverse",
            PageOrder::CreatedDate => "created_date",
            PageOrder::CreatedDateReverse => "created_date_reverse",
            PageOrder::UpdatedDate => "updated_date",
            PageOrder::UpdatedDateReverse => "updated_date_reverse",
            PageOrder::Custom(_) => "custom",
        }
    }
}

impl FromStr for PageOrder {
    type Err = String;

    /// Parse a named ordering; custom orderings cannot be named
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "standard" => Ok(PageOrder::Standard),
            "reverse" => Ok(PageOrder::Reverse),
            "id" => Ok(PageOrder::Id),
            "id_reverse" => Ok(PageOrder::IdReverse),
            "created_date" => Ok(PageOrder::CreatedDate),
            "created_date_reverse" => Ok(PageOrder::CreatedDateReverse),
            "updated_date" => Ok(PageOrder::UpdatedDate),
            "updated_date_reverse" => Ok(PageOrder::UpdatedDateReverse),
            other => Err(format!("unknown page order `{}`", other)),
        }
    }
}

impl Serialize for PageOrder {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for PageOrder {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct ByTitle;

    impl OrderStatement for ByTitle {
        fn order_clause(&self) -> String {
            "page.title COLLATE NOCASE ASC".to_string()
        }
    }

    #[test]
    fn test_order_clauses() {
        assert_eq!(PageOrder::default().order_clause(), "page.position_left ASC");
        assert_eq!(PageOrder::IdReverse.order_clause(), "page.page_id DESC");
        assert_eq!(
            PageOrder::Custom(Arc::new(ByTitle)).order_clause(),
            "page.title COLLATE NOCASE ASC"
        );
    }

    #[test]
    fn test_named_orders_parse() {
        assert!(matches!("Reverse".parse::<PageOrder>(), Ok(PageOrder::Reverse)));
        assert!("custom".parse::<PageOrder>().is_err());

        let json = serde_json::to_string(&PageOrder::UpdatedDateReverse).unwrap();
        assert_eq!(json, "\"updated_date_reverse\"");
        let parsed: PageOrder = serde_json::from_str(&json).unwrap();
        assert!(matches!(parsed, PageOrder::UpdatedDateReverse));
    }
}

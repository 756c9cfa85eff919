/// Shared data structures for the gallery state
///
/// These structs represent the data model that flows between
/// the entry source, the pagination state machine and the UI layer.

use serde::Deserialize;
use std::fmt;

/// One record of the entry source document, as it comes over the wire.
/// Unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceRecord {
    /// Absolute or relative URL of the design screenshot
    pub image_url: String,
    /// Author handle (e.g., "@sammarxz")
    pub author: String,
    /// Category name, compared case-insensitively
    pub category: String,
}

/// Represents a single catalog item in the gallery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Position in the category-filtered, possibly shuffled sequence
    pub id: usize,
    /// URL of the image, requested through the offline cache
    pub image_url: String,
    /// Author handle
    pub author: String,
    /// Category name as stored in the source
    pub category: String,
}

impl Entry {
    pub(crate) fn from_record(id: usize, record: &SourceRecord) -> Self {
        Self {
            id,
            image_url: record.image_url.clone(),
            author: record.author.clone(),
            category: record.category.clone(),
        }
    }
}

/// The category a route selects
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Category {
    /// Every entry, shuffled once per route session
    Random,
    /// Only entries whose category matches (case-insensitive).
    /// Stored lowercase when built through `Category::parse`.
    Named(String),
}

impl Category {
    /// Parse a category name; empty and "random" both select `Random`
    pub fn parse(name: &str) -> Self {
        let name = name.trim();
        if name.is_empty() || name.eq_ignore_ascii_case("random") {
            Category::Random
        } else {
            Category::Named(name.to_lowercase())
        }
    }

    /// Check whether a record's category belongs to this category
    pub fn matches(&self, category: &str) -> bool {
        match self {
            Category::Random => true,
            Category::Named(name) => name.to_lowercase() == category.to_lowercase(),
        }
    }

    /// Lowercase key used for routes and titles
    pub fn key(&self) -> String {
        match self {
            Category::Random => "random".to_string(),
            Category::Named(name) => name.to_lowercase(),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// Categories offered by the navigation bar, in display order
pub const NAV_CATEGORIES: [&str; 6] = ["mobile", "desktop", "watch", "vision", "icons", "illustrations"];

/// A parsed location fragment of the form `#/<category>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub category: Category,
}

impl Route {
    /// Parse a location fragment. Empty, `#` and `#/` select the random category.
    pub fn parse(fragment: &str) -> Self {
        let trimmed = fragment.trim();
        let name = trimmed
            .strip_prefix("#/")
            .or_else(|| trimmed.strip_prefix('#'))
            .unwrap_or(trimmed);
        Self {
            category: Category::parse(name.trim_matches('/')),
        }
    }

    /// Route for a category
    pub fn for_category(category: Category) -> Self {
        Self { category }
    }

    /// The fragment this route would be written as
    pub fn fragment(&self) -> String {
        match &self.category {
            Category::Random => String::new(),
            Category::Named(_) => format!("#/{}", self.category.key()),
        }
    }

    /// Human readable title for the route
    pub fn title(&self) -> &'static str {
        match self.category.key().as_str() {
            "mobile" => "Mobile Designs",
            "desktop" => "Desktop Designs",
            "watch" => "Watch Designs",
            "vision" => "Vision Designs",
            "icons" => "Icon Designs",
            "illustrations" => "Illustration Designs",
            _ => "App Design Inspiration",
        }
    }
}

/// A request for one page of a category.
/// Pure function of the current route and the loader's page counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub category: Category,
    /// 1-based page number
    pub page_number: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_parsing() {
        assert_eq!(Route::parse("").category, Category::Random);
        assert_eq!(Route::parse("#/").category, Category::Random);
        assert_eq!(Route::parse("#/random").category, Category::Random);
        assert_eq!(
            Route::parse("#/Mobile").category,
            Category::Named("mobile".to_string())
        );
        assert_eq!(Route::parse("#/watch/").category.key(), "watch");
    }

    #[test]
    fn test_route_titles() {
        assert_eq!(Route::parse("#/mobile").title(), "Mobile Designs");
        assert_eq!(Route::parse("#/ICONS").title(), "Icon Designs");
        assert_eq!(Route::parse("#/unknown").title(), "App Design Inspiration");
        assert_eq!(Route::parse("").title(), "App Design Inspiration");
    }

    #[test]
    fn test_category_matches_case_insensitively() {
        let mobile = Category::parse("MOBILE");
        assert!(mobile.matches("mobile"));
        assert!(mobile.matches("Mobile"));
        assert!(!mobile.matches("desktop"));
        assert!(Category::Random.matches("anything"));
    }

    #[test]
    fn test_fragment_round_trip() {
        let route = Route::for_category(Category::parse("Desktop"));
        assert_eq!(route.fragment(), "#/desktop");
        assert_eq!(Route::parse(&route.fragment()), route);
        assert_eq!(Route::for_category(Category::Random).fragment(), "");
    }

    #[test]
    fn test_source_record_ignores_unknown_fields() {
        let json = r#"[{"image_url": "a.png", "author": "@a", "category": "mobile", "likes": 3}]"#;
        let records: Vec<SourceRecord> = serde_json::from_str(json).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].author, "@a");
    }
}

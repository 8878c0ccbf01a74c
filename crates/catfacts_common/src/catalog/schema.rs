//! Fact Catalog Schema
//!
//! Defines the records kept in the catalog and the criteria used to query them.

use crate::categories;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::store::StoreError;

/// Schema version stored in `schema_meta`
pub const SCHEMA_VERSION: u32 = 2;

/// Maximum fact text length in characters
pub const MAX_TEXT_CHARS: usize = 1000;

/// Maximum category label length in characters
pub const MAX_CATEGORY_CHARS: usize = 100;

/// Highest rating a user can give; 0 means unrated
pub const MAX_RATING: u8 = 5;

/// A cat fact in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    /// Store-assigned identifier (0 until persisted)
    pub id: i64,
    /// Fact text as returned by the provider, trimmed
    pub text: String,
    /// Length reported by the provider (not re-derived from `text`)
    pub length: i64,
    /// Insertion timestamp, assigned by the store
    pub created_at: DateTime<Utc>,
    pub is_favorite: bool,
    /// Keyword-derived category, assigned at fetch time
    pub category: Option<String>,
    /// 0 = unrated, otherwise 1-5
    pub rating: u8,
}

impl Fact {
    /// Build an unsaved fact from a provider payload
    pub fn fetched(text: &str, length: i64) -> Self {
        let text = text.trim().to_string();
        Self {
            id: 0,
            category: categories::classify(&text).map(str::to_string),
            text,
            length,
            created_at: Utc::now(),
            is_favorite: false,
            rating: 0,
        }
    }

    /// Check field constraints before the record reaches the database
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.text.trim().is_empty() {
            return Err(StoreError::Validation("fact text is required".to_string()));
        }
        let chars = self.text.chars().count();
        if chars > MAX_TEXT_CHARS {
            return Err(StoreError::Validation(format!(
                "fact text is {} characters, limit is {}",
                chars, MAX_TEXT_CHARS
            )));
        }
        if let Some(ref category) = self.category {
            if category.chars().count() > MAX_CATEGORY_CHARS {
                return Err(StoreError::Validation(format!(
                    "category exceeds {} characters",
                    MAX_CATEGORY_CHARS
                )));
            }
        }
        if self.rating > MAX_RATING {
            return Err(StoreError::Validation(format!(
                "rating {} is outside 0-{}",
                self.rating, MAX_RATING
            )));
        }
        Ok(())
    }
}

/// Aggregate catalog statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub total_count: usize,
    /// Mean over rated facts only, rounded to 2 decimals
    pub average_rating: f64,
}

/// Filter criteria for facts
///
/// Every field is optional; supplied criteria are combined with AND.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactFilter {
    /// Case-insensitive substring of the fact text
    pub search_term: Option<String>,
    /// Exact category label
    pub category: Option<String>,
    pub only_favorites: bool,
    pub min_rating: Option<u8>,
    /// Inclusive start date (UTC)
    pub date_from: Option<NaiveDate>,
    /// Inclusive end date (UTC), covers the whole day
    pub date_to: Option<NaiveDate>,
}

impl FactFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search(mut self, term: &str) -> Self {
        self.search_term = Some(term.to_string());
        self
    }

    pub fn category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }

    pub fn favorites(mut self) -> Self {
        self.only_favorites = true;
        self
    }

    pub fn min_rating(mut self, rating: u8) -> Self {
        self.min_rating = Some(rating);
        self
    }

    pub fn between(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.date_from = from;
        self.date_to = to;
        self
    }

    /// Search term, ignoring blank input
    pub fn search_term(&self) -> Option<&str> {
        non_blank(self.search_term.as_deref())
    }

    /// Category, ignoring blank input
    pub fn category_name(&self) -> Option<&str> {
        non_blank(self.category.as_deref())
    }

    /// Lower bound on `created_at` (inclusive)
    pub fn created_from(&self) -> Option<DateTime<Utc>> {
        self.date_from.and_then(start_of_day)
    }

    /// Upper bound on `created_at` (exclusive): midnight after `date_to`
    pub fn created_before(&self) -> Option<DateTime<Utc>> {
        self.date_to
            .and_then(|d| d.succ_opt())
            .and_then(start_of_day)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn start_of_day(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0)
        .map(|naive| Utc.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetched_fact_defaults() {
        let fact = Fact::fetched("  Cats have 32 muscles in each ear.  ", 32);
        assert_eq!(fact.text, "Cats have 32 muscles in each ear.");
        assert_eq!(fact.length, 32);
        assert_eq!(fact.category.as_deref(), Some("anatomy"));
        assert_eq!(fact.rating, 0);
        assert!(!fact.is_favorite);
        assert_eq!(fact.id, 0);
    }

    #[test]
    fn test_validate_limits() {
        let mut fact = Fact::fetched("Cats purr.", 10);
        assert!(fact.validate().is_ok());

        fact.text = "x".repeat(MAX_TEXT_CHARS + 1);
        assert!(matches!(fact.validate(), Err(StoreError::Validation(_))));

        fact.text = "   ".to_string();
        assert!(fact.validate().is_err());

        fact.text = "Cats purr.".to_string();
        fact.category = Some("c".repeat(MAX_CATEGORY_CHARS + 1));
        assert!(fact.validate().is_err());

        fact.category = None;
        fact.rating = 6;
        assert!(fact.validate().is_err());
    }

    #[test]
    fn test_filter_blank_fields_ignored() {
        let filter = FactFilter::new().search("   ").category("");
        assert_eq!(filter.search_term(), None);
        assert_eq!(filter.category_name(), None);
    }

    #[test]
    fn test_date_bounds_cover_whole_day() {
        let day = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        let filter = FactFilter::new().between(Some(day), Some(day));

        let from = filter.created_from().unwrap();
        let before = filter.created_before().unwrap();
        assert_eq!(from.to_rfc3339(), "2026-03-14T00:00:00+00:00");
        assert_eq!(before.to_rfc3339(), "2026-03-15T00:00:00+00:00");
    }

    #[test]
    fn test_filter_from_query_json() {
        let filter: FactFilter = serde_json::from_str(
            r#"{"category":"anatomy","only_favorites":true,"date_to":"2026-01-31"}"#,
        )
        .unwrap();
        assert_eq!(filter.category_name(), Some("anatomy"));
        assert!(filter.only_favorites);
        assert_eq!(filter.min_rating, None);
        assert_eq!(filter.date_to, NaiveDate::from_ymd_opt(2026, 1, 31));
    }
}

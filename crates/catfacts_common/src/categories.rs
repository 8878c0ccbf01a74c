//! Keyword categories for cat facts
//!
//! Rules are evaluated in order and the first group with a matching keyword
//! wins. Matching is a case-insensitive substring check, so "ear" also
//! matches "year"; anatomy is listed first and takes those facts.

/// Category for non-empty text that matches no rule
pub const DEFAULT_CATEGORY: &str = "general";

/// A category label and the keywords that select it
pub struct CategoryRule {
    pub category: &'static str,
    pub keywords: &'static [&'static str],
}

/// Ordered classification rules
pub const CATEGORY_RULES: &[CategoryRule] = &[
    CategoryRule {
        category: "anatomy",
        keywords: &["muscle", "ear", "eye", "tail"],
    },
    CategoryRule {
        category: "behavior",
        keywords: &["sleep", "hunt", "play"],
    },
    CategoryRule {
        category: "lifespan",
        keywords: &["year", "age", "live"],
    },
    CategoryRule {
        category: "breed",
        keywords: &["breed", "species"],
    },
];

/// Classify fact text; `None` only for empty or whitespace text
pub fn classify(text: &str) -> Option<&'static str> {
    if text.trim().is_empty() {
        return None;
    }

    let lower = text.to_lowercase();
    let category = CATEGORY_RULES
        .iter()
        .find(|rule| rule.keywords.iter().any(|kw| lower.contains(kw)))
        .map(|rule| rule.category)
        .unwrap_or(DEFAULT_CATEGORY);

    Some(category)
}

//! Plain-text export of catalog facts

use crate::catalog::{Fact, MAX_RATING};
use chrono::{DateTime, Utc};

pub const REPORT_TITLE: &str = "=== CAT FACTS EXPORT ===";

/// File name for an export taken at `exported_at`
///
/// `attempt` 0 is the plain timestamp name; later attempts add a numeric
/// suffix for exports landing in the same millisecond.
pub fn export_file_name(exported_at: &DateTime<Utc>, attempt: u32) -> String {
    let stamp = exported_at.format("%Y%m%d_%H%M%S_%3f");
    match attempt {
        0 => format!("cat_facts_export_{}.txt", stamp),
        n => format!("cat_facts_export_{}_{}.txt", stamp, n),
    }
}

/// Render the export report, newest fact first
pub fn render_report(facts: &[Fact], exported_at: &DateTime<Utc>) -> String {
    let mut ordered: Vec<&Fact> = facts.iter().collect();
    ordered.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

    let mut out = String::new();
    out.push_str(REPORT_TITLE);
    out.push('\n');
    out.push_str(&format!(
        "Exported at: {}\n",
        exported_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    out.push_str(&format!("Fact count: {}\n", facts.len()));
    out.push('\n');

    for fact in ordered {
        out.push_str(&format!(
            "[{}] {}\n",
            fact.created_at.format("%Y-%m-%d %H:%M"),
            fact.text
        ));
        out.push_str(&format!(
            "   Category: {} | Rating: {}/{} | Favorite: {}\n",
            fact.category.as_deref().unwrap_or("none"),
            fact.rating,
            MAX_RATING,
            if fact.is_favorite { "yes" } else { "no" }
        ));
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fact(id: i64, text: &str, minute: u32) -> Fact {
        let mut fact = Fact::fetched(text, text.len() as i64);
        fact.id = id;
        fact.created_at = Utc.with_ymd_and_hms(2026, 10, 18, 11, minute, 0).unwrap();
        fact
    }

    #[test]
    fn test_file_name_has_timestamp() {
        let ts = Utc.with_ymd_and_hms(2026, 10, 18, 9, 5, 7).unwrap();
        assert_eq!(export_file_name(&ts, 0), "cat_facts_export_20261018_090507_000.txt");
        assert_eq!(export_file_name(&ts, 3), "cat_facts_export_20261018_090507_000_3.txt");
    }

    #[test]
    fn test_render_report() {
        let exported = Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap();
        let mut older = fact(1, "Cats have 32 muscles in each ear.", 10);
        older.rating = 5;
        older.is_favorite = true;
        let mut newer = fact(2, "Cats purr.", 59);
        newer.category = None;

        let report = render_report(&[older, newer], &exported);
        let expected = "\
=== CAT FACTS EXPORT ===
Exported at: 2026-10-18 12:00:00 UTC
Fact count: 2

[2026-10-18 11:59] Cats purr.
   Category: none | Rating: 0/5 | Favorite: no

[2026-10-18 11:10] Cats have 32 muscles in each ear.
   Category: anatomy | Rating: 5/5 | Favorite: yes

";
        assert_eq!(report, expected);
    }

    #[test]
    fn test_render_empty_report() {
        let exported = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let report = render_report(&[], &exported);
        assert!(report.starts_with(REPORT_TITLE));
        assert!(report.contains("Fact count: 0\n"));
        assert!(report.ends_with("\n\n"));
    }
}

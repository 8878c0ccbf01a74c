//! Human-friendly rendering helpers

use chrono::{DateTime, Utc};

/// Relative age of a fact, e.g. "5 min ago"; a date once older than a week
pub fn time_ago(created_at: &DateTime<Utc>, now: &DateTime<Utc>) -> String {
    let age = now.signed_duration_since(*created_at);

    if age.num_minutes() < 1 {
        "just now".to_string()
    } else if age.num_hours() < 1 {
        format!("{} min ago", age.num_minutes())
    } else if age.num_days() < 1 {
        format!("{} h ago", age.num_hours())
    } else if age.num_days() < 7 {
        format!("{} days ago", age.num_days())
    } else {
        created_at.format("%Y-%m-%d").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_time_ago_buckets() {
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap();

        assert_eq!(time_ago(&(now - Duration::seconds(30)), &now), "just now");
        assert_eq!(time_ago(&(now - Duration::minutes(5)), &now), "5 min ago");
        assert_eq!(time_ago(&(now - Duration::hours(3)), &now), "3 h ago");
        assert_eq!(time_ago(&(now - Duration::days(2)), &now), "2 days ago");
        assert_eq!(time_ago(&(now - Duration::days(10)), &now), "2026-10-08");
    }

    #[test]
    fn test_future_timestamp_is_just_now() {
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap();
        assert_eq!(time_ago(&(now + Duration::minutes(2)), &now), "just now");
    }
}

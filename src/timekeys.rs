//! UTC day-key / ISO-week-key helpers.
//!
//! Every time-dependent function here takes `now_ms` as an explicit parameter
//! rather than reading the clock itself, so callers stay deterministic and
//! testable.

use chrono::{DateTime, Datelike, Utc};

/// `YYYY-MM-DD` in UTC.
pub fn day_key(now_ms: i64) -> String {
    let dt = datetime(now_ms);
    dt.format("%Y-%m-%d").to_string()
}

/// `YYYY-Www` ISO week key in UTC.
pub fn iso_week_key(now_ms: i64) -> String {
    let dt = datetime(now_ms);
    let iso = dt.iso_week();
    format!("{}-W{:02}", iso.year(), iso.week())
}

fn datetime(now_ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(now_ms).unwrap_or_else(|| DateTime::from_timestamp(0, 0).unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_key_formats_utc_date() {
        // 2024-01-15T00:00:00Z
        let ms = 1705276800000;
        assert_eq!(day_key(ms), "2024-01-15");
    }

    #[test]
    fn iso_week_key_formats_year_and_week() {
        let ms = 1705276800000;
        let key = iso_week_key(ms);
        assert!(key.starts_with("2024-W"));
    }
}

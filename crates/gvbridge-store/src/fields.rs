//! Projection between in-memory "unset" values and nullable columns.
//!
//! Empty strings and unset timestamps are written as NULL; NULL reads back
//! as the empty string or an unset timestamp.

use chrono::{DateTime, Utc};

/// Unix seconds for a set timestamp, NULL otherwise.
pub fn timestamp_to_column(ts: Option<DateTime<Utc>>) -> Option<i64> {
    ts.map(|ts| ts.timestamp())
}

/// Inverse of [`timestamp_to_column`]. Seconds outside chrono's range read
/// back as unset.
pub fn timestamp_from_column(secs: Option<i64>) -> Option<DateTime<Utc>> {
    secs.and_then(|secs| DateTime::from_timestamp(secs, 0))
}

/// Empty string binds as NULL.
pub fn text_to_column(value: &str) -> Option<&str> {
    (!value.is_empty()).then_some(value)
}

/// NULL reads back as the empty string.
pub fn text_from_column(value: Option<String>) -> String {
    value.unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_timestamp_is_null() {
        assert_eq!(timestamp_to_column(None), None);
        assert_eq!(timestamp_from_column(None), None);
    }

    #[test]
    fn timestamp_round_trip_at_second_precision() {
        let ts = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let column = timestamp_to_column(Some(ts));
        assert_eq!(column, Some(1_700_000_000));
        assert_eq!(timestamp_from_column(column), Some(ts));
    }

    #[test]
    fn out_of_range_seconds_read_as_unset() {
        assert_eq!(timestamp_from_column(Some(i64::MAX)), None);
    }

    #[test]
    fn text_sentinels() {
        assert_eq!(text_to_column(""), None);
        assert_eq!(text_from_column(None), "");
        assert_eq!(text_to_column("UTC"), Some("UTC"));
        assert_eq!(text_from_column(Some("UTC".into())), "UTC");
    }
}

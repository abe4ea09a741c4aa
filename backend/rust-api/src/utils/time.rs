use chrono::{DateTime, Duration, Utc};
use mongodb::bson::DateTime as BsonDateTime;

pub fn chrono_to_bson(dt: DateTime<Utc>) -> BsonDateTime {
    BsonDateTime::from_millis(dt.timestamp_millis())
}

/// Whole minutes and whole seconds, e.g. "3m 42s". Negative durations
/// (clock skew) collapse to zero.
pub fn format_elapsed(elapsed: Duration) -> String {
    let total_seconds = elapsed.num_seconds().max(0);
    format!("{}m {}s", total_seconds / 60, total_seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_minutes_and_seconds() {
        assert_eq!(format_elapsed(Duration::seconds(222)), "3m 42s");
        assert_eq!(format_elapsed(Duration::seconds(59)), "0m 59s");
        assert_eq!(format_elapsed(Duration::seconds(60)), "1m 0s");
    }

    #[test]
    fn negative_elapsed_collapses_to_zero() {
        assert_eq!(format_elapsed(Duration::seconds(-5)), "0m 0s");
    }
}

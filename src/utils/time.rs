use chrono::{DateTime, Duration, Local, NaiveDate, Utc};

/// Formats a duration as `HH:MM:SS`. Hours don't wrap, so multi-day totals
/// stay readable.
pub fn format_hms(duration: Duration) -> String {
    let total = duration.num_seconds().max(0);
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

/// Short human form used in report lines, e.g. `3hr 25min`.
pub fn format_hm(duration: Duration) -> String {
    let total = duration.num_seconds().max(0);
    format!("{}hr {}min", total / 3600, (total % 3600) / 60)
}

/// Report grouping key for a calendar day, local time.
pub fn day_key(timestamp: DateTime<Utc>) -> NaiveDate {
    timestamp.with_timezone(&Local).date_naive()
}

/// Report grouping key for a month, rendered as `YYYY-MM`.
pub fn month_key(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

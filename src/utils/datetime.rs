/// Pure date/time utility functions (Discord-agnostic)
use chrono::{DateTime, NaiveDateTime, Utc};

/// Parse a user-supplied timestamp into a UTC instant.
///
/// Accepts RFC 3339 ("2025-03-15T18:30:00Z") and the shorter
/// "YYYY-MM-DD HH:MM" form, which is interpreted as UTC.
pub fn parse_utc_timestamp(input: &str) -> Option<DateTime<Utc>> {
    let trimmed = input.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Help text for the timestamp format accepted by /remind
pub fn timestamp_format_help() -> String {
    "Time must be UTC, either \"YYYY-MM-DD HH:MM\" (e.g. 2025-03-15 18:30) \
     or RFC 3339 (e.g. 2025-03-15T18:30:00Z)"
        .to_string()
}

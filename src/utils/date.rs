//! Free-form date parsing for header fields and collection date ranges.
//!
//! Dates in page headers are written by hand, so the parser accepts the
//! common spellings instead of a single strict format:
//!
//! | Input | Meaning |
//! |-------|---------|
//! | `1591012800` | unix timestamp |
//! | `2020-06-01T12:00:00Z` | RFC 3339 |
//! | `Mon, 01 Jun 2020 12:00:00 GMT` | RFC 2822 |
//! | `2020-06-01 12:00[:00]`, `2020-06-01`, `2020/06/01` | ISO-like |
//! | `01-06-2020`, `06/01/2020` | day-first with `-`, month-first with `/` |
//! | `June 1, 2020`, `1 June 2020` | long month names |
//! | `now`, `today`, `yesterday`, `tomorrow`, `+3 days`, `-2 weeks` | relative |
//!
//! All results are unix timestamps in seconds (UTC).

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

/// Datetime layouts tried in order after the RFC formats.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Date-only layouts, interpreted at midnight UTC.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d-%m-%Y",
    "%m/%d/%Y",
    "%d.%m.%Y",
    "%B %d, %Y",
    "%B %d %Y",
    "%b %d, %Y",
    "%b %d %Y",
    "%d %B %Y",
    "%d %b %Y",
];

// ============================================================================
// Public API
// ============================================================================

/// Parse free-form date text relative to the current time.
///
/// `preferred` is a chrono format string tried before the built-in list
/// (the site's configured header date format).
pub fn parse_date(text: &str, preferred: Option<&str>) -> Option<i64> {
    parse_date_at(text, preferred, Utc::now().timestamp())
}

/// Parse free-form date text, resolving relative expressions against `now`.
pub fn parse_date_at(text: &str, preferred: Option<&str>, now: i64) -> Option<i64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Some(ts) = parse_relative(text, now) {
        return Some(ts);
    }

    if text.bytes().all(|b| b.is_ascii_digit()) && text.len() > 8 {
        return text.parse().ok();
    }

    if let Some(fmt) = preferred.filter(|f| !f.is_empty())
        && let Some(ts) = parse_with(text, fmt)
    {
        return Some(ts);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.timestamp());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.timestamp());
    }

    DATETIME_FORMATS
        .iter()
        .chain(DATE_FORMATS)
        .find_map(|fmt| parse_with(text, fmt))
}

/// Convert a YAML/JSON header value into a timestamp.
///
/// Integers are taken as timestamps, strings go through [`parse_date`].
pub fn value_to_timestamp(value: &serde_json::Value, preferred: Option<&str>) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => parse_date(s, preferred),
        _ => None,
    }
}

/// Render a timestamp as `YYYY-MM-DD HH:MM:SS` (UTC) for display.
pub fn format_timestamp(ts: i64) -> String {
    DateTime::<Utc>::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ts.to_string())
}

// ============================================================================
// Internal
// ============================================================================

/// Try one layout, as a datetime first and then as a bare date.
fn parse_with(text: &str, fmt: &str) -> Option<i64> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
        return Some(dt.and_utc().timestamp());
    }
    NaiveDate::parse_from_str(text, fmt)
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN).and_utc().timestamp())
}

/// Relative keywords and `+N unit` / `-N unit` offsets.
fn parse_relative(text: &str, now: i64) -> Option<i64> {
    let lower = text.to_ascii_lowercase();
    let midnight = |ts: i64| ts - ts.rem_euclid(86_400);

    match lower.as_str() {
        "now" => return Some(now),
        "today" => return Some(midnight(now)),
        "yesterday" => return Some(midnight(now) - 86_400),
        "tomorrow" => return Some(midnight(now) + 86_400),
        _ => {}
    }

    let (sign, rest) = match lower.as_bytes().first()? {
        b'+' => (1, &lower[1..]),
        b'-' => (-1, &lower[1..]),
        _ => return None,
    };
    let mut parts = rest.split_whitespace();
    let amount: i64 = parts.next()?.parse().ok()?;
    let unit = parts.next()?;
    if parts.next().is_some() {
        return None;
    }

    let step: i64 = match unit.trim_end_matches('s') {
        "second" | "sec" => 1,
        "minute" | "min" => 60,
        "hour" => 3_600,
        "day" => 86_400,
        "week" => 7 * 86_400,
        "month" => 30 * 86_400,
        "year" => 365 * 86_400,
        _ => return None,
    };

    Some(now + sign * amount * step)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_591_012_800; // 2020-06-01T12:00:00Z

    #[test]
    fn test_parse_iso_date() {
        assert_eq!(parse_date_at("2020-01-01", None, NOW), Some(1_577_836_800));
        assert_eq!(parse_date_at("2020/01/01", None, NOW), Some(1_577_836_800));
    }

    #[test]
    fn test_parse_iso_datetime() {
        assert_eq!(
            parse_date_at("2020-01-01 10:30", None, NOW),
            Some(1_577_836_800 + 10 * 3600 + 30 * 60)
        );
        assert_eq!(
            parse_date_at("2020-01-01T10:30:15Z", None, NOW),
            Some(1_577_836_800 + 10 * 3600 + 30 * 60 + 15)
        );
    }

    #[test]
    fn test_parse_day_first_and_month_first() {
        // `-` separated is day-first, `/` separated is month-first
        assert_eq!(parse_date_at("02-01-2020", None, NOW), Some(1_577_836_800 + 86_400));
        assert_eq!(parse_date_at("01/02/2020", None, NOW), Some(1_577_836_800 + 86_400));
    }

    #[test]
    fn test_parse_long_month_names() {
        assert_eq!(parse_date_at("June 1, 2020", None, NOW), Some(NOW - 12 * 3600));
        assert_eq!(parse_date_at("1 June 2020", None, NOW), Some(NOW - 12 * 3600));
    }

    #[test]
    fn test_parse_preferred_format_wins() {
        // Ambiguous input: preferred says month-first
        assert_eq!(
            parse_date_at("02-01-2020", Some("%m-%d-%Y"), NOW),
            Some(1_580_515_200)
        );
    }

    #[test]
    fn test_parse_relative() {
        assert_eq!(parse_date_at("now", None, NOW), Some(NOW));
        assert_eq!(parse_date_at("today", None, NOW), Some(NOW - 12 * 3600));
        assert_eq!(parse_date_at("+2 days", None, NOW), Some(NOW + 2 * 86_400));
        assert_eq!(parse_date_at("-1 week", None, NOW), Some(NOW - 7 * 86_400));
    }

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_date_at("1591012800", None, NOW), Some(NOW));
    }

    #[test]
    fn test_parse_invalid() {
        assert_eq!(parse_date_at("", None, NOW), None);
        assert_eq!(parse_date_at("not a date", None, NOW), None);
        assert_eq!(parse_date_at("2020-13-45", None, NOW), None);
        assert_eq!(parse_date_at("+3 fortnights", None, NOW), None);
    }

    #[test]
    fn test_value_to_timestamp() {
        assert_eq!(value_to_timestamp(&serde_json::json!(42), None), Some(42));
        assert_eq!(
            value_to_timestamp(&serde_json::json!("2020-01-01"), None),
            Some(1_577_836_800)
        );
        assert_eq!(value_to_timestamp(&serde_json::json!(true), None), None);
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(NOW), "2020-06-01 12:00:00");
    }
}

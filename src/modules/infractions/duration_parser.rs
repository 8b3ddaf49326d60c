use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use std::sync::LazyLock;

// `mo` must come before `m` so months aren't read as minutes.
/// Longest accepted duration: 100 years.
pub const MAX_DURATION_SECONDS: i64 = 100 * 365 * 24 * 3600;

static DURATION_PART: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*(y|mo|w|d|h|m|s)").expect("valid duration regex"));

/// Parses durations like `1y2mo3w4d5h6m7s`. Every unit is optional but at least one is required,
/// and nothing but units may appear.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim().to_lowercase();
    let mut total_seconds = 0i64;
    let mut consumed = 0;

    for cap in DURATION_PART.captures_iter(&s) {
        let whole = cap.get(0)?;
        if !s[consumed..whole.start()].trim().is_empty() {
            return None;
        }
        consumed = whole.end();

        let value: i64 = cap[1].parse().ok()?;
        let unit_seconds = match &cap[2] {
            "y" => 365 * 24 * 3600,
            "mo" => 30 * 24 * 3600,
            "w" => 7 * 24 * 3600,
            "d" => 24 * 3600,
            "h" => 3600,
            "m" => 60,
            "s" => 1,
            _ => 0,
        };
        total_seconds = total_seconds.checked_add(value.checked_mul(unit_seconds)?)?;
    }

    if consumed == 0
        || !s[consumed..].trim().is_empty()
        || total_seconds == 0
        || total_seconds > MAX_DURATION_SECONDS
    {
        return None;
    }
    Duration::try_seconds(total_seconds)
}

/// The moment a duration typed by a moderator ends, counted from `now`.
/// `None` when the input is invalid or the date would be out of range.
pub fn parse_expiry(s: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    now.checked_add_signed(parse_duration(s)?)
}

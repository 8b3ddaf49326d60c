use chrono::{Duration, NaiveDateTime};

const UNITS: [(&str, i64); 6] = [
    ("year", 365 * 24 * 3600),
    ("month", 30 * 24 * 3600),
    ("day", 24 * 3600),
    ("hour", 3600),
    ("minute", 60),
    ("second", 1),
];

/// "2 hours and 30 minutes". Only the two largest non-zero units are kept.
pub fn humanize_delta(delta: Duration) -> String {
    let mut remaining = delta.num_seconds().abs();
    let mut parts = vec![];

    for (name, size) in UNITS {
        if parts.len() == 2 {
            break;
        }
        let amount = remaining / size;
        if amount > 0 {
            remaining -= amount * size;
            let plural = if amount == 1 { "" } else { "s" };
            parts.push(format!("{amount} {name}{plural}"));
        }
    }

    match parts.as_slice() {
        [] => "less than a second".to_string(),
        [only] => only.clone(),
        [first, second] => format!("{first} and {second}"),
        _ => parts.join(", "),
    }
}

/// A Discord timestamp tag, rendered in the reader's timezone.
pub fn discord_timestamp(at: NaiveDateTime) -> String {
    format!("<t:{}:f>", at.and_utc().timestamp())
}

/// "<t:…:f> (1 day)" when an end is known, otherwise just the timestamp.
pub fn format_with_duration(start: NaiveDateTime, end: Option<NaiveDateTime>) -> String {
    match end {
        Some(end) => format!("{} ({})", discord_timestamp(start), humanize_delta(end - start)),
        None => discord_timestamp(start),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 1, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn humanizes_largest_two_units() {
        assert_eq!(humanize_delta(Duration::seconds(1)), "1 second");
        assert_eq!(humanize_delta(Duration::minutes(150)), "2 hours and 30 minutes");
        assert_eq!(humanize_delta(Duration::seconds(90061)), "1 day and 1 hour");
        assert_eq!(humanize_delta(Duration::zero()), "less than a second");
    }

    #[test]
    fn formats_created_with_duration() {
        assert_eq!(
            format_with_duration(at(1, 0), Some(at(2, 0))),
            "<t:1672531200:f> (1 day)"
        );
        assert_eq!(format_with_duration(at(1, 0), None), "<t:1672531200:f>");
    }
}

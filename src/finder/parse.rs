//! Parsing of human-written size and time specifications
//!
//! Sizes use binary multiples (`K` = 1024). Absolute times without an offset
//! are read as UTC.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::errors::{FindError, FindResult};

const SIZE_UNITS: &[(&str, u64)] = &[
    ("TB", 1 << 40),
    ("GB", 1 << 30),
    ("MB", 1 << 20),
    ("KB", 1 << 10),
    ("T", 1 << 40),
    ("G", 1 << 30),
    ("M", 1 << 20),
    ("K", 1 << 10),
    ("B", 1),
];

/// Parse a size such as `512`, `100K`, `20MB` or `1G` into bytes.
pub fn parse_size(spec: &str) -> FindResult<u64> {
    let upper = spec.trim().to_ascii_uppercase();
    let (digits, multiplier) = SIZE_UNITS
        .iter()
        .find_map(|(suffix, mult)| upper.strip_suffix(suffix).map(|rest| (rest, *mult)))
        .unwrap_or((upper.as_str(), 1));

    let value: u64 = digits
        .trim()
        .parse()
        .map_err(|_| FindError::InvalidSize(spec.to_string()))?;

    value
        .checked_mul(multiplier)
        .ok_or_else(|| FindError::InvalidSize(spec.to_string()))
}

/// Parse an absolute point in time.
///
/// Accepted forms: `YYYY-MM-DD`, RFC 3339, and `YYYY-MM-DD HH:MM`.
pub fn parse_time(spec: &str) -> FindResult<DateTime<Utc>> {
    let s = spec.trim();

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M") {
        return Ok(ts.and_utc());
    }

    Err(FindError::InvalidTime(spec.to_string()))
}

/// Parse a relative duration such as `45s`, `30m`, `3h`, `7d` or `2w`.
pub fn parse_duration(spec: &str) -> FindResult<Duration> {
    let s = spec.trim();
    let split = s
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| FindError::InvalidTime(spec.to_string()))?;
    let (digits, unit) = s.split_at(split);

    let value: u64 = digits
        .parse()
        .map_err(|_| FindError::InvalidTime(spec.to_string()))?;
    let seconds_per_unit = match unit {
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        "w" => 7 * 24 * 60 * 60,
        _ => return Err(FindError::InvalidTime(spec.to_string())),
    };

    value
        .checked_mul(seconds_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| FindError::InvalidTime(spec.to_string()))
}

/// Resolve a "since" specification against `now`.
///
/// A relative duration counts back from `now`; anything else must be an
/// absolute time understood by [`parse_time`].
pub fn parse_since(spec: &str, now: DateTime<Utc>) -> FindResult<DateTime<Utc>> {
    match parse_duration(spec) {
        Ok(ago) => {
            let ago = chrono::Duration::from_std(ago)
                .map_err(|_| FindError::InvalidTime(spec.to_string()))?;
            now.checked_sub_signed(ago)
                .ok_or_else(|| FindError::InvalidTime(spec.to_string()))
        }
        Err(_) => parse_time(spec),
    }
}

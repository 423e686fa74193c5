//! Duration parsing for declared timeouts.
//!
//! Timeouts are absolute nanosecond budgets. Definitions may spell them as a
//! plain integer (nanoseconds) or with a unit suffix: "100ns", "500us",
//! "250ms", "2s", "1m".

use crate::error::Error;
use serde::{Deserialize, Deserializer};
use std::time::Duration;

/// Parses a human-readable duration string into a `Duration`.
///
/// Supported formats:
/// - Nanoseconds: "100ns", or a plain number "250000000"
/// - Microseconds: "500us"
/// - Milliseconds: "100ms", "500ms"
/// - Seconds: "1s", "30s"
/// - Minutes: "1m", "5m"
///
/// # Errors
///
/// Returns an error if the format is invalid or the value is out of range.
///
/// # Examples
///
/// ```
/// use httpbind::duration::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
/// assert_eq!(parse_duration("1s").unwrap(), Duration::from_secs(1));
/// assert_eq!(parse_duration("1m").unwrap(), Duration::from_secs(60));
/// assert_eq!(parse_duration("250000000").unwrap(), Duration::from_millis(250));
/// ```
pub fn parse_duration(s: &str) -> Result<Duration, Error> {
    let s = s.trim();

    if s.is_empty() {
        return Err(Error::configuration("Duration cannot be empty"));
    }

    // Longest suffixes first so "ms" is not read as minutes
    let units: [(&str, fn(u64) -> Option<Duration>); 5] = [
        ("ns", |n| Some(Duration::from_nanos(n))),
        ("us", |n| Some(Duration::from_micros(n))),
        ("ms", |n| Some(Duration::from_millis(n))),
        ("s", |n| Some(Duration::from_secs(n))),
        ("m", |n| n.checked_mul(60).map(Duration::from_secs)),
    ];

    for (suffix, build) in units {
        if let Some(value) = s.strip_suffix(suffix) {
            let amount: u64 = value.trim().parse().map_err(|_| {
                Error::configuration(format!("Invalid duration value '{value}' in '{s}'"))
            })?;
            return build(amount)
                .ok_or_else(|| Error::configuration(format!("Duration out of range: {s}")));
        }
    }

    let nanos: u64 = s.parse().map_err(|_| {
        Error::configuration(format!(
            "Invalid duration format: {s}. Use nanoseconds or a form like '500us', '250ms', '2s', '1m'"
        ))
    })?;
    Ok(Duration::from_nanos(nanos))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDuration {
    Nanos(u64),
    Text(String),
}

/// Serde adapter for optional timeouts written as nanoseconds or unit strings.
///
/// # Errors
///
/// Fails deserialization when the string form cannot be parsed.
pub fn deserialize_timeout<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<RawDuration>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawDuration::Nanos(nanos)) => Ok(Some(Duration::from_nanos(nanos))),
        Some(RawDuration::Text(text)) => parse_duration(&text)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

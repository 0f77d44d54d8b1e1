use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rand::Rng;
use rand::distr::Alphanumeric;

use crate::types::OhlcvError;

/// Default length of the random token substituted into `{rand}` placeholders.
pub const SESSION_ID_LEN: usize = 6;

const RESOLUTION_LABELS: [(i64, &str); 14] = [
    (60_000, "1 Minute"),
    (180_000, "3 Minutes"),
    (300_000, "5 Minutes"),
    (600_000, "10 Minutes"),
    (900_000, "15 Minutes"),
    (1_800_000, "30 Minutes"),
    (2_700_000, "45 Minutes"),
    (3_600_000, "1 Hour"),
    (7_200_000, "2 Hours"),
    (10_800_000, "3 Hours"),
    (14_400_000, "4 Hours"),
    (21_600_000, "6 Hours"),
    (43_200_000, "12 Hour"),
    (86_400_000, "1 Day"),
];

const NAMED_RESOLUTIONS: [(&str, i64); 3] = [
    ("minute", 60_000),
    ("hourly", 3_600_000),
    ("daily", 86_400_000),
];

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
];

/// Seconds since the epoch to milliseconds.
#[must_use]
pub const fn epoch_to_ms(seconds: i64) -> i64 {
    seconds.saturating_mul(1000)
}

/// Milliseconds since the epoch to whole seconds (truncating).
#[must_use]
pub const fn ms_to_epoch(ms: i64) -> i64 {
    ms / 1000
}

/// Milliseconds since the epoch as a UTC datetime.
#[must_use]
pub fn ms_to_datetime(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
}

/// Label a resolution for display.
///
/// ```
/// use ohlcv_core::human_readable;
///
/// assert_eq!(human_readable(3_600_000), "1 Hour");
/// assert_eq!(human_readable(12345), "Undetectable resolution: 12345");
/// ```
#[must_use]
pub fn human_readable(resolution_ms: i64) -> String {
    RESOLUTION_LABELS
        .iter()
        .find(|(ms, _)| *ms == resolution_ms)
        .map_or_else(
            || format!("Undetectable resolution: {resolution_ms}"),
            |(_, label)| (*label).to_string(),
        )
}

/// Resolve a named resolution (`minute`, `hourly`, `daily`) to milliseconds.
///
/// # Errors
/// Returns `OhlcvError::InvalidResolution` for any other name.
pub fn string_resolution_to_ms(name: &str) -> Result<i64, OhlcvError> {
    NAMED_RESOLUTIONS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, ms)| *ms)
        .ok_or_else(|| OhlcvError::InvalidResolution(name.to_string()))
}

/// `part` as a percentage of `whole`, rounded to two decimals.
///
/// # Errors
/// Returns `OhlcvError::DivisionByZero` when `whole` is zero.
#[allow(clippy::cast_precision_loss)]
pub fn percentage(part: u64, whole: u64) -> Result<f64, OhlcvError> {
    if whole == 0 {
        return Err(OhlcvError::DivisionByZero);
    }
    let pct = 100.0 * part as f64 / whole as f64;
    Ok((pct * 100.0).round() / 100.0)
}

/// Parse a configuration datetime (UTC) into epoch milliseconds.
///
/// Accepts RFC 3339, `YYYY-MM-DDTHH:MM:SS`, `YYYY-MM-DD HH:MM:SS` (optionally
/// with fractional seconds) and a bare `YYYY-MM-DD`.
///
/// # Errors
/// Returns `OhlcvError::InvalidArg` if no format matches.
pub fn parse_datetime_ms(text: &str) -> Result<i64, OhlcvError> {
    let s = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.timestamp_millis());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(naive.and_utc().timestamp_millis());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().timestamp_millis())
        .ok_or_else(|| OhlcvError::InvalidArg(format!("unrecognized datetime: {text:?}")))
}

/// Nominal width of an exchange interval label such as `15m` or `1d`.
///
/// Month intervals (`1M`) have no fixed width and yield `None`, as do
/// unrecognized labels.
#[must_use]
pub fn interval_to_ms(label: &str) -> Option<i64> {
    let label = label.trim();
    let unit = label.chars().last()?;
    let count: i64 = label[..label.len() - unit.len_utf8()].parse().ok()?;
    if count <= 0 {
        return None;
    }
    let unit_ms: i64 = match unit {
        's' => 1_000,
        'm' => 60_000,
        'h' => 3_600_000,
        'd' => 86_400_000,
        'w' => 604_800_000,
        _ => return None,
    };
    count.checked_mul(unit_ms)
}

/// A random alphanumeric token of `len` characters.
#[must_use]
pub fn session_id(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

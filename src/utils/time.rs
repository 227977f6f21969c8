//! Time utilities for feed timestamps and the process timezone offset

use chrono::{DateTime, Days, Duration, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;

use crate::errors::IngestError;

/// Parse a compact XMLTV timestamp such as `20240115020000 +0000`.
///
/// Only year, month, day, hour and minute are read. Seconds and any
/// trailing offset (`+0300`, ` -0500`) are ignored: the process timezone
/// is authoritative.
pub fn parse_feed_timestamp(value: &str) -> Result<NaiveDateTime, IngestError> {
    let value = value.trim();
    let digits = value.bytes().take_while(u8::is_ascii_digit).count();
    let (compact, rest) = value.split_at(digits);

    let offset_follows = rest.is_empty()
        || rest.starts_with(|c: char| c == '+' || c == '-' || c.is_whitespace());
    if !(digits == 12 || digits == 14) || !offset_follows {
        return Err(IngestError::malformed_timestamp(
            value,
            "expected YYYYMMDDHHMM or YYYYMMDDHHMMSS",
        ));
    }

    // All ASCII digits, so slicing and parsing cannot fail.
    let field = |range: std::ops::Range<usize>| -> u32 {
        compact[range].parse().unwrap_or_default()
    };

    let year = field(0..4) as i32;
    let (month, day, hour, minute) = (field(4..6), field(6..8), field(8..10), field(10..12));

    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(hour, minute, 0))
        .ok_or_else(|| IngestError::malformed_timestamp(value, "date or time out of range"))
}

/// Seconds the given zone is ahead of UTC at `at`.
pub fn utc_offset_seconds(tz: &Tz, at: DateTime<Utc>) -> i32 {
    tz.offset_from_utc_datetime(&at.naive_utc())
        .fix()
        .local_minus_utc()
}

/// Convert a local wall-clock time to UTC given a fixed offset.
pub fn local_to_utc(local: NaiveDateTime, offset_seconds: i32) -> DateTime<Utc> {
    (local - Duration::seconds(i64::from(offset_seconds))).and_utc()
}

/// Today's calendar date in the given zone.
pub fn local_today(tz: &Tz) -> NaiveDate {
    Utc::now().with_timezone(tz).date_naive()
}

/// First local date that survives the retention sweep.
pub fn retention_cutoff(today: NaiveDate, retention_days: i64) -> Result<NaiveDate, IngestError> {
    u64::try_from(retention_days)
        .ok()
        .and_then(|days| today.checked_sub_days(Days::new(days)))
        .ok_or_else(|| {
            IngestError::configuration(format!(
                "retention_days {} is out of range",
                retention_days
            ))
        })
}

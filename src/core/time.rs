use thiserror::Error;
use time::{
    format_description::FormatItem, macros::format_description, macros::offset, Duration,
    OffsetDateTime, PrimitiveDateTime, UtcOffset,
};

/// Fixed Istanbul offset. The region abolished daylight saving in 2016, so a
/// constant UTC+3 is correct for every timestamp this system handles.
pub(crate) const ISTANBUL: UtcOffset = offset!(+3);

/// The datetime-local form humans type and read: minute granularity, no offset.
const NAIVE_MINUTE: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]");

#[derive(Debug, Error, PartialEq, Eq)]
#[error("malformed timestamp {0:?}, expected YYYY-MM-DDTHH:MM")]
pub(crate) struct MalformedTimestamp(pub(crate) String);

/// Interprets a naive `YYYY-MM-DDTHH:MM` string as Istanbul wall-clock time
/// and returns the corresponding absolute instant in UTC.
///
/// Every schedule-related value a human enters must pass through here; handing
/// the naive string to anything that assumes the device's local timezone is
/// exactly the bug this module exists to prevent.
pub(crate) fn to_instant(naive: &str) -> Result<OffsetDateTime, MalformedTimestamp> {
    let parsed = PrimitiveDateTime::parse(naive, NAIVE_MINUTE)
        .map_err(|_| MalformedTimestamp(naive.to_string()))?;
    Ok(parsed.assume_offset(ISTANBUL).to_offset(UtcOffset::UTC))
}

/// Renders an absolute instant as Istanbul wall-clock fields in the same
/// naive format, regardless of the caller's own timezone. Sub-minute
/// precision is dropped; all timestamps in this system are minute-granular.
pub(crate) fn to_naive_local(instant: OffsetDateTime) -> String {
    let istanbul = instant.to_offset(ISTANBUL);
    istanbul.format(NAIVE_MINUTE).unwrap_or_else(|_| istanbul.to_string())
}

pub(crate) fn truncate_to_minute(value: OffsetDateTime) -> OffsetDateTime {
    value
        - Duration::seconds(i64::from(value.second()))
        - Duration::nanoseconds(i64::from(value.nanosecond()))
}

pub(crate) fn minutes_between(from: OffsetDateTime, to: OffsetDateTime) -> i64 {
    (to - from).whole_minutes()
}

//! File age classification.
//!
//! Rotated logs conventionally carry their creation date in the name, as the
//! third underscore-separated segment before the first dot:
//! `<prefix>_<prefix>_<YYYYMMDD>.log`. When the name doesn't follow that
//! convention the filesystem's creation time is used instead.
//!
//! Dates carry no timezone, so ages are counted in local wall-clock days.

use std::path::Path;
use std::sync::OnceLock;
use time::{Date, Month, OffsetDateTime, UtcOffset};

const DATE_SEGMENT: usize = 2;

static LOCAL_OFFSET: OnceLock<UtcOffset> = OnceLock::new();

/// The local UTC offset, detected on first use and cached.
///
/// Detection can fail once the process has more than one thread (the `time`
/// crate refuses to read the environment then), in which case UTC is used.
/// Binaries should call this before starting their async runtime.
pub fn local_offset() -> UtcOffset {
    *LOCAL_OFFSET.get_or_init(|| {
        UtcOffset::current_local_offset().unwrap_or_else(|e| {
            tracing::debug!(error = %e, "Could not determine local offset; using UTC");
            UtcOffset::UTC
        })
    })
}

/// Whole days elapsed since the file's nominal creation date.
///
/// Never fails: a name without a valid date falls back to the creation time,
/// then the modification time (on platforms that don't record creation), and
/// finally to "now" (age `0`) when the file can't be inspected at all.
pub fn age_days(path: impl AsRef<Path>) -> i64 {
    age_days_at(path, OffsetDateTime::now_utc().to_offset(local_offset()))
}

/// Same as [`age_days`], measured against an explicit `now`.
///
/// Name-derived dates are taken as midnight at `now`'s offset, so the
/// answer matches a wall clock in that zone. The result is truncated toward
/// zero, so a file dated in the future has a negative age.
pub fn age_days_at(path: impl AsRef<Path>, now: OffsetDateTime) -> i64 {
    let path = path.as_ref();
    let origin = match date_from_name(path) {
        Some(date) => date.midnight().assume_offset(now.offset()),
        None => filesystem_timestamp(path).unwrap_or_else(|| {
            tracing::debug!(path = %path.display(), "No usable timestamp; treating file as new");
            now
        }),
    };
    (now - origin).whole_days()
}

/// Parse the `YYYYMMDD` token embedded in a log file's name.
pub fn date_from_name(path: impl AsRef<Path>) -> Option<Date> {
    let name = path.as_ref().file_name()?.to_str()?;
    let stem = name.split('.').next()?;
    parse_date_token(stem.split('_').nth(DATE_SEGMENT)?)
}

fn parse_date_token(token: &str) -> Option<Date> {
    if token.len() != 8 || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: i32 = token[0..4].parse().ok()?;
    let month: u8 = token[4..6].parse().ok()?;
    let day: u8 = token[6..8].parse().ok()?;
    Date::from_calendar_date(year, Month::try_from(month).ok()?, day).ok()
}

fn filesystem_timestamp(path: &Path) -> Option<OffsetDateTime> {
    let metadata = std::fs::metadata(path).ok()?;
    let timestamp = metadata.created().or_else(|_| metadata.modified()).ok()?;
    Some(timestamp.into())
}

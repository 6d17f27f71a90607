//! Time expression parsing for CLI arguments.
//!
//! Two separate grammars:
//! - future times for reminders: "30m", "2h", "1d", "1w", "tomorrow", ISO dates
//! - relative past dates for searches: "2h ago", "3mo ago", "yesterday", "today"

use chrono::{
    DateTime, Local, Months, NaiveDate, NaiveDateTime, SecondsFormat, TimeDelta, TimeZone, Utc,
};
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

/// Matches: "30m", "2h", "1d", "1w"
static FUTURE_OFFSET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]+)(m|h|d|w)$").expect("valid offset regex"));

/// Matches: "2h ago", "1d ago", "2w ago", "1mo ago" (input is lowercased first)
static RELATIVE_AGO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]+)(mo|h|d|w)\s*ago$").expect("valid ago regex"));

const NAIVE_DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimeError {
    #[error("Invalid time format: \"{0}\". Use: 30m, 1h, 2d, 1w, tomorrow, or an ISO date")]
    InvalidTimeFormat(String),
    #[error("Time must be in the future: \"{0}\"")]
    TimeInPast(String),
    #[error(
        "Invalid date format: \"{0}\". Use: \"1h ago\", \"2d ago\", \"3w ago\", \"1mo ago\", \"yesterday\", or \"today\""
    )]
    InvalidDateFormat(String),
}

/// Parses a reminder time relative to the current local time.
pub fn parse_future_time(input: &str) -> Result<DateTime<Utc>, TimeError> {
    parse_future_time_at(input, Local::now())
}

/// Parses a reminder time into an absolute instant.
///
/// # Supported formats
/// - Offsets: "30m", "2h", "1d", "1w" (from `now`)
/// - "tomorrow": exactly 24 hours after `now`
/// - RFC3339: "2024-01-15T10:00:00Z"
/// - Naive date-time: "2024-01-15T10:00" (in `now`'s time zone)
/// - Date: "2024-01-15" (midnight UTC)
///
/// Absolute dates must be strictly after `now`.
pub fn parse_future_time_at<Tz: TimeZone>(
    input: &str,
    now: DateTime<Tz>,
) -> Result<DateTime<Utc>, TimeError> {
    let invalid = || TimeError::InvalidTimeFormat(input.to_string());
    let now_utc = now.with_timezone(&Utc);

    // Offsets first so nothing ISO-shaped is read as one.
    if let Some(caps) = FUTURE_OFFSET_RE.captures(input) {
        let value: i64 = caps[1].parse().map_err(|_| invalid())?;
        let delta = offset_delta(value, &caps[2]).ok_or_else(invalid)?;
        return now_utc.checked_add_signed(delta).ok_or_else(invalid);
    }

    if input.eq_ignore_ascii_case("tomorrow") {
        return now_utc
            .checked_add_signed(TimeDelta::hours(24))
            .ok_or_else(invalid);
    }

    let at = parse_iso_datetime(input, &now.timezone()).ok_or_else(invalid)?;
    if at <= now_utc {
        return Err(TimeError::TimeInPast(input.to_string()));
    }
    Ok(at)
}

/// Parses a relative past date against the current local time.
pub fn parse_relative_date(input: &str) -> Result<String, TimeError> {
    parse_relative_date_at(input, Local::now())
}

/// Parses a relative past date into an ISO 8601 UTC timestamp
/// (`2024-05-15T10:00:00.000Z`).
///
/// "today" and "yesterday" are midnights in `now`'s time zone. Month offsets
/// use calendar arithmetic and clamp to the end of shorter months, so
/// "1mo ago" on March 31 lands on the last day of February.
pub fn parse_relative_date_at<Tz: TimeZone>(
    input: &str,
    now: DateTime<Tz>,
) -> Result<String, TimeError> {
    relative_instant(input, now).map(|at| format_iso(&at))
}

fn relative_instant<Tz: TimeZone>(input: &str, now: DateTime<Tz>) -> Result<DateTime<Utc>, TimeError> {
    let invalid = || TimeError::InvalidDateFormat(input.to_string());
    let lower = input.to_lowercase();

    match lower.as_str() {
        "yesterday" => {
            let date = now.date_naive().pred_opt().ok_or_else(invalid)?;
            return local_midnight(date, &now.timezone()).ok_or_else(invalid);
        }
        "today" => return local_midnight(now.date_naive(), &now.timezone()).ok_or_else(invalid),
        _ => {}
    }

    let caps = RELATIVE_AGO_RE.captures(&lower).ok_or_else(invalid)?;
    let unit = &caps[2];
    if unit == "mo" {
        let months: u32 = caps[1].parse().map_err(|_| invalid())?;
        let wall = now
            .naive_local()
            .checked_sub_months(Months::new(months))
            .ok_or_else(invalid)?;
        return localize(&wall, &now.timezone()).ok_or_else(invalid);
    }

    let value: i64 = caps[1].parse().map_err(|_| invalid())?;
    let delta = offset_delta(value, unit).ok_or_else(invalid)?;
    now.with_timezone(&Utc)
        .checked_sub_signed(delta)
        .ok_or_else(invalid)
}

fn offset_delta(value: i64, unit: &str) -> Option<TimeDelta> {
    match unit {
        "m" => TimeDelta::try_minutes(value),
        "h" => TimeDelta::try_hours(value),
        "d" => TimeDelta::try_days(value),
        "w" => TimeDelta::try_weeks(value),
        _ => None,
    }
}

fn parse_iso_datetime<Tz: TimeZone>(input: &str, tz: &Tz) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(input) {
        return Some(at.with_timezone(&Utc));
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return localize(&naive, tz);
        }
    }

    let date = NaiveDate::parse_from_str(input, "%Y-%m-%d").ok()?;
    let midnight = date.and_hms_opt(0, 0, 0)?;
    Some(Utc.from_utc_datetime(&midnight))
}

fn local_midnight<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> Option<DateTime<Utc>> {
    localize(&date.and_hms_opt(0, 0, 0)?, tz)
}

/// Pins a wall-clock time in `tz` to an instant. Repeated wall times take the
/// earlier instant; wall times skipped by a DST change move forward an hour.
fn localize<Tz: TimeZone>(wall: &NaiveDateTime, tz: &Tz) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(wall)
        .earliest()
        .or_else(|| {
            let shifted = wall.checked_add_signed(TimeDelta::hours(1))?;
            tz.from_local_datetime(&shifted).earliest()
        })
        .map(|at| at.with_timezone(&Utc))
}

pub fn format_iso(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, FixedOffset, LocalResult};

    /// US Eastern time with the 2024 DST rules only: EDT from
    /// 2024-03-10 07:00 UTC to 2024-11-03 06:00 UTC, EST otherwise.
    #[derive(Debug, Clone, Copy)]
    struct Eastern2024;

    fn eastern_offset(dst: bool) -> FixedOffset {
        let hours = if dst { -4 } else { -5 };
        FixedOffset::east_opt(hours * 3600).expect("offset")
    }

    fn naive(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|date| date.and_hms_opt(hour, minute, 0))
            .expect("valid naive datetime")
    }

    impl TimeZone for Eastern2024 {
        type Offset = FixedOffset;

        fn from_offset(_offset: &FixedOffset) -> Self {
            Eastern2024
        }

        fn offset_from_local_date(&self, local: &NaiveDate) -> LocalResult<FixedOffset> {
            self.offset_from_local_datetime(&local.and_hms_opt(0, 0, 0).expect("midnight"))
        }

        fn offset_from_local_datetime(&self, local: &NaiveDateTime) -> LocalResult<FixedOffset> {
            // A wall time is valid under an offset if mapping it back to UTC
            // lands in the period that offset covers.
            let fits = |dst: bool| {
                let offset = eastern_offset(dst);
                let utc = *local - TimeDelta::seconds(offset.local_minus_utc() as i64);
                self.offset_from_utc_datetime(&utc) == offset
            };
            match (fits(true), fits(false)) {
                (true, true) => LocalResult::Ambiguous(eastern_offset(true), eastern_offset(false)),
                (true, false) => LocalResult::Single(eastern_offset(true)),
                (false, true) => LocalResult::Single(eastern_offset(false)),
                (false, false) => LocalResult::None,
            }
        }

        fn offset_from_utc_date(&self, utc: &NaiveDate) -> FixedOffset {
            self.offset_from_utc_datetime(&utc.and_hms_opt(0, 0, 0).expect("midnight"))
        }

        fn offset_from_utc_datetime(&self, utc: &NaiveDateTime) -> FixedOffset {
            let dst = *utc >= naive(2024, 3, 10, 7, 0) && *utc < naive(2024, 11, 3, 6, 0);
            eastern_offset(dst)
        }
    }

    fn eastern(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Eastern2024> {
        Eastern2024
            .from_local_datetime(&naive(year, month, day, hour, minute))
            .single()
            .expect("unambiguous eastern time")
    }

    fn test_now() -> DateTime<Utc> {
        // Wednesday, January 28, 2026, 15:04:05 UTC
        Utc.with_ymd_and_hms(2026, 1, 28, 15, 4, 5)
            .single()
            .expect("valid datetime")
    }

    fn utc(year: i32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, hour, minute, second)
            .single()
            .expect("valid datetime")
    }

    fn iso(at: DateTime<Utc>) -> String {
        format_iso(&at)
    }

    #[test]
    fn future_offsets() {
        let now = test_now();

        assert_eq!(parse_future_time_at("30m", now), Ok(now + Duration::minutes(30)));
        assert_eq!(parse_future_time_at("2h", now), Ok(now + Duration::hours(2)));
        assert_eq!(parse_future_time_at("1d", now), Ok(now + Duration::days(1)));
        assert_eq!(parse_future_time_at("3w", now), Ok(now + Duration::weeks(3)));
        assert_eq!(parse_future_time_at("0m", now), Ok(now));
        assert_eq!(parse_future_time_at("90m", now), Ok(now + Duration::minutes(90)));
    }

    #[test]
    fn future_tomorrow_is_fixed_24_hours() {
        let now = test_now();
        let expected = utc(2026, 1, 29, 15, 4, 5);

        assert_eq!(parse_future_time_at("tomorrow", now), Ok(expected));
        assert_eq!(parse_future_time_at("Tomorrow", now), Ok(expected));
    }

    #[test]
    fn future_tomorrow_ignores_local_calendar() {
        // 23:30 at +02:00; tomorrow is still +24h, not the next local midnight.
        let tz = FixedOffset::east_opt(2 * 3600).expect("offset");
        let now = tz.with_ymd_and_hms(2026, 3, 10, 23, 30, 0).single().expect("valid");

        assert_eq!(
            parse_future_time_at("tomorrow", now),
            Ok(utc(2026, 3, 11, 21, 30, 0))
        );
    }

    #[test]
    fn future_iso_dates() {
        let now = test_now();

        assert_eq!(
            parse_future_time_at("2026-02-01T09:00:00Z", now),
            Ok(utc(2026, 2, 1, 9, 0, 0))
        );
        assert_eq!(
            parse_future_time_at("2026-02-01T09:00:00+02:00", now),
            Ok(utc(2026, 2, 1, 7, 0, 0))
        );
        assert_eq!(parse_future_time_at("2026-03-01", now), Ok(utc(2026, 3, 1, 0, 0, 0)));
    }

    #[test]
    fn future_naive_datetime_uses_callers_zone() {
        let tz = FixedOffset::east_opt(2 * 3600).expect("offset");
        let now = test_now().with_timezone(&tz);

        assert_eq!(
            parse_future_time_at("2026-02-01T09:00", now),
            Ok(utc(2026, 2, 1, 7, 0, 0))
        );
        assert_eq!(
            parse_future_time_at("2026-02-01T09:00:30", now),
            Ok(utc(2026, 2, 1, 7, 0, 30))
        );
    }

    #[test]
    fn future_iso_in_the_past_is_rejected() {
        let now = test_now();

        assert_eq!(
            parse_future_time_at("2026-01-01T00:00:00Z", now),
            Err(TimeError::TimeInPast("2026-01-01T00:00:00Z".to_string()))
        );
        // Equal to now is not strictly in the future.
        assert_eq!(
            parse_future_time_at("2026-01-28T15:04:05Z", now),
            Err(TimeError::TimeInPast("2026-01-28T15:04:05Z".to_string()))
        );
    }

    #[test]
    fn future_invalid_input() {
        let now = test_now();
        for input in [
            "not-a-time",
            "",
            "30",
            "m",
            "30 m",
            "30M",
            "30x",
            "-5m",
            "30m later",
            " 30m",
            "2mo",
            "2d ago",
            "99999999999999999999m",
            "9999999999999w",
        ] {
            assert_eq!(
                parse_future_time_at(input, now),
                Err(TimeError::InvalidTimeFormat(input.to_string())),
                "input {input:?}"
            );
        }
    }

    #[test]
    fn future_error_message_names_the_input() {
        let err = parse_future_time_at("soonish", test_now()).expect_err("should fail");
        assert!(err.to_string().contains("Invalid time format"));
        assert!(err.to_string().contains("soonish"));
    }

    #[test]
    fn relative_past_offsets() {
        let now = test_now();

        assert_eq!(
            parse_relative_date_at("2h ago", now),
            Ok(iso(now - Duration::hours(2)))
        );
        assert_eq!(
            parse_relative_date_at("1d ago", now),
            Ok(iso(now - Duration::days(1)))
        );
        assert_eq!(
            parse_relative_date_at("2w ago", now),
            Ok(iso(now - Duration::weeks(2)))
        );
        assert_eq!(parse_relative_date_at("0h ago", now), Ok(iso(now)));
        assert_eq!(
            parse_relative_date_at("3dago", now),
            Ok(iso(now - Duration::days(3)))
        );
        assert_eq!(
            parse_relative_date_at("3d   ago", now),
            Ok(iso(now - Duration::days(3)))
        );
    }

    #[test]
    fn relative_months_use_calendar_arithmetic() {
        let may = utc(2024, 5, 15, 10, 0, 0);
        assert_eq!(
            parse_relative_date_at("3mo ago", may),
            Ok("2024-02-15T10:00:00.000Z".to_string())
        );

        let end_of_january = utc(2024, 1, 31, 8, 30, 0);
        assert_eq!(
            parse_relative_date_at("3mo ago", end_of_january),
            Ok("2023-10-31T08:30:00.000Z".to_string())
        );

        // Clamped to the end of February.
        let end_of_march = utc(2024, 3, 31, 12, 0, 0);
        assert_eq!(
            parse_relative_date_at("1mo ago", end_of_march),
            Ok("2024-02-29T12:00:00.000Z".to_string())
        );

        assert_eq!(
            parse_relative_date_at("12mo ago", may),
            Ok("2023-05-15T10:00:00.000Z".to_string())
        );
    }

    #[test]
    fn relative_months_landing_in_a_dst_gap_move_forward() {
        // 2024-03-10 02:30 does not exist in Eastern time.
        let now = eastern(2024, 4, 10, 2, 30);
        assert_eq!(
            parse_relative_date_at("1mo ago", now),
            Ok("2024-03-10T07:30:00.000Z".to_string())
        );
    }

    #[test]
    fn relative_months_landing_in_a_dst_overlap_take_the_earlier_instant() {
        // 2024-11-03 01:30 happens twice: first in EDT, then in EST.
        let now = eastern(2024, 12, 3, 1, 30);
        assert_eq!(
            parse_relative_date_at("1mo ago", now),
            Ok("2024-11-03T05:30:00.000Z".to_string())
        );
    }

    #[test]
    fn relative_months_keep_local_wall_time_across_dst() {
        // 09:00 EDT in May is 09:00 EST in February.
        let now = eastern(2024, 5, 15, 9, 0);
        assert_eq!(
            parse_relative_date_at("3mo ago", now),
            Ok("2024-02-15T14:00:00.000Z".to_string())
        );
    }

    #[test]
    fn future_naive_datetime_around_dst_changes() {
        let now = eastern(2024, 3, 1, 12, 0);
        assert_eq!(
            parse_future_time_at("2024-03-10T02:30", now),
            Ok(utc(2024, 3, 10, 7, 30, 0))
        );
        assert_eq!(
            parse_future_time_at("2024-11-03T01:30", now),
            Ok(utc(2024, 11, 3, 5, 30, 0))
        );
    }

    #[test]
    fn relative_named_days_are_local_midnights() {
        let now = test_now();
        assert_eq!(
            parse_relative_date_at("today", now),
            Ok("2026-01-28T00:00:00.000Z".to_string())
        );
        assert_eq!(
            parse_relative_date_at("yesterday", now),
            Ok("2026-01-27T00:00:00.000Z".to_string())
        );

        // 02:00 at +05:00 is still the previous day in UTC.
        let tz = FixedOffset::east_opt(5 * 3600).expect("offset");
        let now = tz.with_ymd_and_hms(2024, 5, 15, 2, 0, 0).single().expect("valid");
        assert_eq!(
            parse_relative_date_at("today", now),
            Ok("2024-05-14T19:00:00.000Z".to_string())
        );
        assert_eq!(
            parse_relative_date_at("yesterday", now),
            Ok("2024-05-13T19:00:00.000Z".to_string())
        );
    }

    #[test]
    fn relative_yesterday_crosses_month_and_year() {
        let now = utc(2025, 1, 1, 9, 0, 0);
        assert_eq!(
            parse_relative_date_at("yesterday", now),
            Ok("2024-12-31T00:00:00.000Z".to_string())
        );
    }

    #[test]
    fn relative_is_case_insensitive() {
        let now = test_now();
        assert_eq!(
            parse_relative_date_at("YESTERDAY", now),
            parse_relative_date_at("yesterday", now)
        );
        assert_eq!(
            parse_relative_date_at("Today", now),
            parse_relative_date_at("today", now)
        );
        assert_eq!(
            parse_relative_date_at("2D ago", now),
            parse_relative_date_at("2d ago", now)
        );
        assert_eq!(
            parse_relative_date_at("1MO AGO", now),
            parse_relative_date_at("1mo ago", now)
        );
    }

    #[test]
    fn relative_invalid_input() {
        let now = test_now();
        for input in [
            "gibberish",
            "",
            "2d",
            "ago",
            "2m ago",
            "2y ago",
            "-2d ago",
            "2d ago!",
            " 2d ago",
            "tomorrow",
            "2026-01-01",
            "99999999999999999999h ago",
            "9999999999mo ago",
        ] {
            assert_eq!(
                parse_relative_date_at(input, now),
                Err(TimeError::InvalidDateFormat(input.to_string())),
                "input {input:?}"
            );
        }
    }

    #[test]
    fn relative_error_message_names_the_input() {
        let err = parse_relative_date_at("gibberish", test_now()).expect_err("should fail");
        assert!(err.to_string().contains("\"gibberish\""));
        assert!(err.to_string().contains("Invalid date format"));
    }

    #[test]
    fn iso_output_has_millisecond_precision() {
        assert_eq!(iso(utc(2024, 5, 15, 10, 0, 0)), "2024-05-15T10:00:00.000Z");
    }
}

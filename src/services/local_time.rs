//! Hotel-local time helpers shared by ticketing, listings and reports
//!
//! Every "local" value in the system is rendered in the single configured
//! hotel timezone, independent of where the process runs.

use chrono::{
    DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, TimeZone,
    Utc,
};
use chrono_tz::Tz;

use crate::error::{AppError, AppResult};

/// Half-open UTC interval `[start, end)` covering one local calendar day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DayWindow {
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }

    pub fn length(&self) -> Duration {
        self.end - self.start
    }
}

/// First instant at or after `naive` that exists in `tz`.
///
/// Ambiguous wall times (fall back) resolve to the earlier instant; wall times
/// inside a spring-forward gap move to the end of the gap.
pub fn resolve_local(naive: NaiveDateTime, tz: Tz) -> DateTime<Utc> {
    let mut candidate = naive;
    // Real-world gaps never exceed a few hours; step in quarter hours
    for _ in 0..(4 * 24) {
        if let Some(instant) = tz.from_local_datetime(&candidate).earliest() {
            return instant.with_timezone(&Utc);
        }
        candidate += Duration::minutes(15);
    }
    Utc.from_utc_datetime(&naive)
}

/// UTC window of a local calendar day; 23 or 25 hours long across DST changes
pub fn day_window(date: NaiveDate, tz: Tz) -> DayWindow {
    let start = resolve_local(date.and_time(NaiveTime::MIN), tz);
    let next = date.succ_opt().unwrap_or(date);
    let end = resolve_local(next.and_time(NaiveTime::MIN), tz);
    DayWindow { start, end }
}

/// Parse a `YYYY-MM-DD` query parameter
pub fn parse_date(value: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::Validation("date must be formatted as YYYY-MM-DD".to_string()))
}

/// Instant rendered with the hotel offset
pub fn to_local(instant: DateTime<Utc>, tz: Tz) -> DateTime<FixedOffset> {
    instant.with_timezone(&tz).fixed_offset()
}

/// Current calendar day at the hotel
pub fn local_today(now: DateTime<Utc>, tz: Tz) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}

/// Storage form of a UTC instant; fixed width so text comparison orders instants
pub fn format_utc(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Storage form of a local rendering (RFC 3339 with offset)
pub fn format_offset(local: DateTime<FixedOffset>) -> String {
    local.to_rfc3339_opts(SecondsFormat::Millis, false)
}

/// `YYYY-MM-DD HH:MM` in the hotel timezone
pub fn format_local_datetime(instant: DateTime<Utc>, tz: Tz) -> String {
    instant.with_timezone(&tz).format("%Y-%m-%d %H:%M").to_string()
}

/// `HH:MM` in the hotel timezone
pub fn format_local_time(instant: DateTime<Utc>, tz: Tz) -> String {
    instant.with_timezone(&tz).format("%H:%M").to_string()
}

/// Two-digit local hour, "00".."23"
pub fn local_hour_key(instant: DateTime<Utc>, tz: Tz) -> String {
    instant.with_timezone(&tz).format("%H").to_string()
}

/// Whole minutes between two instants, rounded half away from zero
pub fn rounded_minutes(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    ((to - from).num_milliseconds() as f64 / 60_000.0).round() as i64
}

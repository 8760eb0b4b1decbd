//! Reservation and activity-log records.

use chrono::{DateTime, FixedOffset, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Minutes in a day; `start_minute` is always below this.
pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// Display format used for occurrence instants in logs and publisher arguments,
/// e.g. `Mon, 02 Jan 2006 15:04:05`.
pub const OCCURRENCE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S";

/// A stored scheduling rule: record `title` every `day_of_week` at
/// `start_minute` for `duration_secs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    /// Unique, immutable; also the dedup key.
    pub id: String,
    pub title: String,
    /// 0–6, Sunday = 0.
    pub day_of_week: u8,
    /// Minutes since local midnight, 0–1439.
    pub start_minute: u32,
    /// Window length in whole seconds.
    pub duration_secs: u64,
    /// When `false` the reservation is removed once its occurrence is scheduled.
    pub recurring: bool,
}

impl Reservation {
    /// Build a reservation with a freshly generated id.
    pub fn new(
        title: impl Into<String>,
        day_of_week: u8,
        start_minute: u32,
        duration_secs: u64,
        recurring: bool,
        now: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            id: generate_id(now),
            title: title.into(),
            day_of_week,
            start_minute,
            duration_secs,
            recurring,
        }
    }

    pub fn duration(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.duration_secs).unwrap_or(i64::MAX))
    }

    pub fn weekday(&self) -> Weekday {
        weekday_from_index(self.day_of_week)
    }

    /// Minute of day at which the window closes, without wrapping past midnight.
    pub fn end_minute(&self) -> u64 {
        u64::from(self.start_minute) + self.duration_secs.div_ceil(60)
    }
}

/// Convert the minutes typed into the management interface into the
/// stored window length.
pub fn duration_from_minutes(minutes: u32) -> u64 {
    u64::from(minutes) * 60
}

/// `RFC 3339 timestamp` + three random digits, e.g. `2024-05-06T10:00:00+09:00042`.
pub fn generate_id(now: DateTime<FixedOffset>) -> String {
    let suffix = Uuid::new_v4().as_u128() % 1000;
    format!("{}{suffix:03}", now.to_rfc3339_opts(chrono::SecondsFormat::Secs, false))
}

/// Parse `"HH:MM"` into minutes since midnight.
pub fn parse_start_time(raw: &str) -> Option<u32> {
    let (h, m) = raw.trim().split_once(':')?;
    let h: u32 = h.parse().ok()?;
    let m: u32 = m.parse().ok()?;
    if h >= 24 || m >= 60 {
        return None;
    }
    Some(h * 60 + m)
}

/// Render minutes since midnight as `"HH:MM"`. Values past midnight keep
/// counting hours (`24:30`) so an end time stays readable.
pub fn format_minute(minute: u64) -> String {
    format!("{:02}:{:02}", minute / 60, minute % 60)
}

/// Sunday = 0. Out-of-range values wrap modulo 7.
pub fn weekday_from_index(index: u8) -> Weekday {
    match index % 7 {
        0 => Weekday::Sun,
        1 => Weekday::Mon,
        2 => Weekday::Tue,
        3 => Weekday::Wed,
        4 => Weekday::Thu,
        5 => Weekday::Fri,
        _ => Weekday::Sat,
    }
}

pub fn weekday_name(index: u8) -> &'static str {
    match weekday_from_index(index) {
        Weekday::Sun => "Sunday",
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
    }
}

pub fn format_occurrence(at: &DateTime<FixedOffset>) -> String {
    at.format(OCCURRENCE_FORMAT).to_string()
}

/// One line of the human-readable activity log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub logged_at: DateTime<FixedOffset>,
    pub message: String,
}

impl LogEntry {
    pub fn new(logged_at: DateTime<FixedOffset>, message: impl Into<String>) -> Self {
        Self { logged_at, message: message.into() }
    }
}

use std::fmt;

use chrono::{DateTime, LocalResult, NaiveDate, NaiveDateTime, TimeZone as _, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{DashboardError, Result};

/// Hours subtracted from local wall-clock time before taking the date, so a
/// logical day runs 02:00 → 02:00.
pub const DAY_BOUNDARY_HOURS: i64 = 2;

// ── System timezone detection ─────────────────────────────────────────────────

/// Detect the IANA timezone name of the running system.
///
/// Falls back to `"UTC"` if detection fails.
pub fn get_system_timezone() -> String {
    iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string())
}

// ── DayBand ───────────────────────────────────────────────────────────────────

/// One of the four fixed intra-day eating bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DayBand {
    #[serde(rename = "2-12")]
    Morning,
    #[serde(rename = "12-17")]
    Afternoon,
    #[serde(rename = "17-22")]
    Evening,
    #[serde(rename = "22-2")]
    Night,
}

impl DayBand {
    /// All bands in chart order.
    pub const ALL: [DayBand; 4] = [
        DayBand::Morning,
        DayBand::Afternoon,
        DayBand::Evening,
        DayBand::Night,
    ];

    /// Classify a local hour of day (0–23). Hours outside the first three
    /// bands, including 00:00–01:59, fall into [`DayBand::Night`].
    pub fn from_hour(hour: u32) -> Self {
        if (2..12).contains(&hour) {
            DayBand::Morning
        } else if (12..17).contains(&hour) {
            DayBand::Afternoon
        } else if (17..22).contains(&hour) {
            DayBand::Evening
        } else {
            DayBand::Night
        }
    }

    /// The band's display label, e.g. `"17-22"`.
    pub fn label(self) -> &'static str {
        match self {
            DayBand::Morning => "2-12",
            DayBand::Afternoon => "12-17",
            DayBand::Evening => "17-22",
            DayBand::Night => "22-2",
        }
    }
}

impl fmt::Display for DayBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ── TimezoneHandler ───────────────────────────────────────────────────────────

/// Reference timezone used to interpret instants as local wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimezoneHandler {
    tz: Tz,
}

impl TimezoneHandler {
    /// Create a handler for the given IANA timezone name.
    ///
    /// If `tz_name` is not a recognised IANA timezone, falls back to UTC
    /// and logs a warning.
    pub fn new(tz_name: &str) -> Self {
        let tz = tz_name.parse::<Tz>().unwrap_or_else(|_| {
            warn!(
                "TimezoneHandler: unrecognised timezone \"{}\", falling back to UTC",
                tz_name
            );
            Tz::UTC
        });
        Self { tz }
    }

    pub fn from_tz(tz: Tz) -> Self {
        Self { tz }
    }

    /// The configured reference timezone.
    pub fn tz(&self) -> Tz {
        self.tz
    }

    /// Parse a timestamp string into a UTC instant.
    ///
    /// RFC 3339 strings keep their own offset. Naive date-times such as
    /// `"2024-01-15T13:15"` are read as wall-clock time in the reference zone.
    pub fn parse_timestamp(&self, s: &str) -> Result<DateTime<Utc>> {
        let s = s.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(dt.with_timezone(&Utc));
        }

        const FMTS: &[&str] = &[
            "%Y-%m-%dT%H:%M:%S%.f",
            "%Y-%m-%dT%H:%M:%S",
            "%Y-%m-%dT%H:%M",
            "%Y-%m-%d %H:%M:%S%.f",
            "%Y-%m-%d %H:%M:%S",
            "%Y-%m-%d %H:%M",
        ];
        for fmt in FMTS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
                return self
                    .resolve_local(naive)
                    .ok_or_else(|| DashboardError::TimestampParse(s.to_string()));
            }
        }

        Err(DashboardError::TimestampParse(s.to_string()))
    }

    /// Pin a wall-clock time in the reference zone to an instant.
    ///
    /// A time repeated by a DST fall-back takes the earlier instant. A time
    /// skipped by a spring-forward gap is moved forward by the gap's hour.
    fn resolve_local(&self, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
        let local = match self.tz.from_local_datetime(&naive) {
            LocalResult::Single(dt) => dt,
            LocalResult::Ambiguous(earliest, _) => earliest,
            LocalResult::None => self
                .tz
                .from_local_datetime(&(naive + chrono::Duration::hours(1)))
                .earliest()?,
        };
        Some(local.with_timezone(&Utc))
    }

    /// Convert a UTC instant to the reference zone.
    pub fn to_local(&self, dt: DateTime<Utc>) -> DateTime<Tz> {
        dt.with_timezone(&self.tz)
    }

    /// Classify `dt` into its logical date and day band.
    ///
    /// The band comes from the local hour; the date comes from local time
    /// shifted back by [`DAY_BOUNDARY_HOURS`]. Both are always derived
    /// together so that 00:00–01:59 lands in the previous day's night band.
    pub fn logical_day(&self, dt: DateTime<Utc>) -> (NaiveDate, DayBand) {
        let local = self.to_local(dt).naive_local();
        let band = DayBand::from_hour(local.hour());
        let date = (local - chrono::Duration::hours(DAY_BOUNDARY_HOURS)).date();
        (date, band)
    }
}

impl Default for TimezoneHandler {
    fn default() -> Self {
        Self::from_tz(Tz::UTC)
    }
}

/// Parse a calendar date such as `"2024-01-15"`.
///
/// Date-time strings are accepted too; only their date part is kept.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    let s = s.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date);
    }
    let has_time_part = matches!(s.as_bytes().get(10), Some(b'T' | b' '));
    s.get(..10)
        .filter(|_| has_time_part)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
        .ok_or_else(|| DashboardError::TimestampParse(s.to_string()))
}

// ── Tests ──────────────────────────────────────────────────────────────────────

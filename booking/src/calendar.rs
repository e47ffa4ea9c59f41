//! Bookable dates and time slots.
//!
//! Mirrors the organization's booking configuration: how far ahead requests
//! must be made, how far out they may go, weekdays and date ranges that are
//! closed, and the standard morning and afternoon slots offered to groups.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a requested date cannot be booked
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum CalendarError {
    /// Inside the advance-notice window
    #[error("bookings must be made at least {advance_days} days ahead (earliest date: {earliest})")]
    TooSoon {
        /// Required notice
        advance_days: u32,
        /// First bookable date
        earliest: NaiveDate,
    },
    /// Beyond the booking horizon
    #[error("bookings cannot be made more than {max_days} days ahead (latest date: {latest})")]
    TooFar {
        /// Horizon
        max_days: u32,
        /// Last bookable date
        latest: NaiveDate,
    },
    /// The weekday is closed
    #[error("no bookings on {weekday}")]
    BlockedWeekday {
        /// Closed weekday
        weekday: Weekday,
    },
    /// Inside a closed date range
    #[error("{date} falls in a closed period ({start} to {end})")]
    BlockedRange {
        /// Requested date
        date: NaiveDate,
        /// Range start, inclusive
        start: NaiveDate,
        /// Range end, inclusive
        end: NaiveDate,
    },
}

/// An inclusive closed period
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// First closed day
    pub start: NaiveDate,
    /// Last closed day
    pub end: NaiveDate,
}

impl DateRange {
    /// Whether `date` lies within the range
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Booking calendar rules
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingCalendar {
    /// Minimum notice in days
    pub advance_booking_days: u32,
    /// Horizon in days
    pub max_booking_days: u32,
    /// Closed weekdays
    pub blocked_weekdays: Vec<Weekday>,
    /// Closed date ranges
    pub blocked_ranges: Vec<DateRange>,
    /// Morning start times offered to groups
    pub morning_slots: Vec<NaiveTime>,
    /// Afternoon start times offered to groups
    pub afternoon_slots: Vec<NaiveTime>,
}

impl Default for BookingCalendar {
    fn default() -> Self {
        let at = |h| NaiveTime::from_hms_opt(h, 0, 0).unwrap_or(NaiveTime::MIN);
        Self {
            advance_booking_days: 7,
            max_booking_days: 365,
            blocked_weekdays: Vec::new(),
            blocked_ranges: Vec::new(),
            morning_slots: vec![at(9), at(10), at(11)],
            afternoon_slots: vec![at(14), at(15), at(16)],
        }
    }
}

impl BookingCalendar {
    /// First bookable date relative to `now`
    #[must_use]
    pub fn earliest_date(&self, now: DateTime<Utc>) -> NaiveDate {
        (now + Duration::days(i64::from(self.advance_booking_days))).date_naive()
    }

    /// Last bookable date relative to `now`
    #[must_use]
    pub fn latest_date(&self, now: DateTime<Utc>) -> NaiveDate {
        (now + Duration::days(i64::from(self.max_booking_days))).date_naive()
    }

    /// Check a requested start against every rule
    ///
    /// # Errors
    ///
    /// Returns the first rule the date breaks.
    pub fn validate(&self, requested: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), CalendarError> {
        let date = requested.date_naive();

        let earliest = self.earliest_date(now);
        if date < earliest {
            return Err(CalendarError::TooSoon {
                advance_days: self.advance_booking_days,
                earliest,
            });
        }

        let latest = self.latest_date(now);
        if date > latest {
            return Err(CalendarError::TooFar {
                max_days: self.max_booking_days,
                latest,
            });
        }

        let weekday = date.weekday();
        if self.blocked_weekdays.contains(&weekday) {
            return Err(CalendarError::BlockedWeekday { weekday });
        }

        if let Some(range) = self.blocked_ranges.iter().find(|r| r.contains(date)) {
            return Err(CalendarError::BlockedRange {
                date,
                start: range.start,
                end: range.end,
            });
        }

        Ok(())
    }

    /// Every slot start, morning first
    #[must_use]
    pub fn time_slots(&self) -> Vec<NaiveTime> {
        self.morning_slots
            .iter()
            .chain(&self.afternoon_slots)
            .copied()
            .collect()
    }
}

/// Parse a comma-separated weekday list such as `"sat,sun"`
///
/// Unknown names are skipped.
#[must_use]
pub fn parse_weekdays(raw: &str) -> Vec<Weekday> {
    raw.split(',')
        .filter_map(|s| s.trim().parse::<Weekday>().ok())
        .collect()
}

/// Parse `start..end` ranges separated by commas, e.g.
/// `"2025-12-24..2026-01-06,2026-08-01..2026-08-31"`
///
/// Malformed entries are skipped.
#[must_use]
pub fn parse_date_ranges(raw: &str) -> Vec<DateRange> {
    raw.split(',')
        .filter_map(|entry| {
            let (start, end) = entry.trim().split_once("..")?;
            let start = NaiveDate::parse_from_str(start.trim(), "%Y-%m-%d").ok()?;
            let end = NaiveDate::parse_from_str(end.trim(), "%Y-%m-%d").ok()?;
            (start <= end).then_some(DateRange { start, end })
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        // Sunday
        Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap()
    }

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 10, 0, 0).unwrap()
    }

    #[test]
    fn rejects_dates_inside_the_advance_window() {
        let calendar = BookingCalendar::default();

        let err = calendar.validate(at(2025, 6, 5), now()).unwrap_err();
        assert_eq!(
            err,
            CalendarError::TooSoon {
                advance_days: 7,
                earliest: NaiveDate::from_ymd_opt(2025, 6, 8).unwrap(),
            }
        );
        assert!(calendar.validate(at(2025, 6, 8), now()).is_ok());
    }

    #[test]
    fn rejects_dates_past_the_horizon() {
        let calendar = BookingCalendar::default();
        assert!(matches!(
            calendar.validate(at(2026, 6, 2), now()),
            Err(CalendarError::TooFar { .. })
        ));
    }

    #[test]
    fn rejects_blocked_weekdays_and_ranges() {
        let calendar = BookingCalendar {
            blocked_weekdays: parse_weekdays("sat, sun"),
            blocked_ranges: parse_date_ranges("2025-08-01..2025-08-31"),
            ..BookingCalendar::default()
        };

        // 2025-06-14 is a Saturday
        assert_eq!(
            calendar.validate(at(2025, 6, 14), now()).unwrap_err(),
            CalendarError::BlockedWeekday { weekday: Weekday::Sat }
        );
        // 2025-08-12 is a Tuesday inside the closed month
        assert!(matches!(
            calendar.validate(at(2025, 8, 12), now()),
            Err(CalendarError::BlockedRange { .. })
        ));
        assert!(calendar.validate(at(2025, 6, 17), now()).is_ok());
    }

    #[test]
    fn parsing_skips_garbage() {
        assert_eq!(parse_weekdays("mon,funday,Fri"), vec![Weekday::Mon, Weekday::Fri]);
        assert_eq!(
            parse_date_ranges("2025-01-10..2025-01-01, nope, 2025-02-01..2025-02-02").len(),
            1
        );
    }

    #[test]
    fn default_slots_cover_morning_and_afternoon() {
        let slots = BookingCalendar::default().time_slots();
        assert_eq!(slots.len(), 6);
        assert_eq!(slots[0], NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert_eq!(slots[5], NaiveTime::from_hms_opt(16, 0, 0).unwrap());
    }
}

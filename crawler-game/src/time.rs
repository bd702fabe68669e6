//! In-game calendar time.
//!
//! The calendar is non-terrestrial: 100 seconds make a minute,
//! 100 minutes an hour, 10 hours a day, 50 days a month and 10 months a year.
//! Both value types count whole base seconds in a signed 64-bit integer and
//! reserve the minimum value as a `NONE` sentinel.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};
use std::str::FromStr;
use thiserror::Error;

use crate::numbers::round_f64_to_i64;

pub const SECONDS_PER_MINUTE: i64 = 100;
pub const MINUTES_PER_HOUR: i64 = 100;
pub const HOURS_PER_DAY: i64 = 10;
pub const DAYS_PER_MONTH: i64 = 50;
pub const MONTHS_PER_YEAR: i64 = 10;

pub const SECONDS_PER_HOUR: i64 = SECONDS_PER_MINUTE * MINUTES_PER_HOUR;
pub const SECONDS_PER_DAY: i64 = SECONDS_PER_HOUR * HOURS_PER_DAY;
pub const SECONDS_PER_MONTH: i64 = SECONDS_PER_DAY * DAYS_PER_MONTH;
pub const SECONDS_PER_YEAR: i64 = SECONDS_PER_MONTH * MONTHS_PER_YEAR;

/// Year shown for `TimePoint::ZERO`.
pub const EPOCH_YEAR: i64 = 3000;

/// Errors raised while parsing a calendar string.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimeParseError {
    #[error("expected `YYYY.MM.DD HH:MM:SS`, got `{0}`")]
    Format(String),
    #[error("{field} out of range (got {value})")]
    Range { field: &'static str, value: i64 },
}

/// An absolute instant, in base seconds since the epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimePoint(i64);

/// A signed span between two instants, in base seconds.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TimeDuration(i64);

impl TimePoint {
    /// Unset/invalid instant. Never valid in arithmetic.
    pub const NONE: Self = Self(i64::MIN);
    pub const ZERO: Self = Self(0);

    #[must_use]
    pub const fn from_seconds(seconds: i64) -> Self {
        Self(seconds)
    }

    #[must_use]
    pub const fn seconds(self) -> i64 {
        self.0
    }

    #[must_use]
    pub const fn is_none(self) -> bool {
        self.0 == i64::MIN
    }

    #[must_use]
    pub const fn is_valid(self) -> bool {
        !self.is_none()
    }

    /// Index of the whole hour this instant falls in (floor division).
    #[must_use]
    pub const fn hour_index(self) -> i64 {
        self.0.div_euclid(SECONDS_PER_HOUR)
    }

    /// Start of the hour with the given index.
    #[must_use]
    pub const fn from_hour_index(hour: i64) -> Self {
        Self(hour * SECONDS_PER_HOUR)
    }

    /// Number of whole-hour boundaries crossed moving from `self` to `later`.
    #[must_use]
    pub const fn hour_boundaries_until(self, later: Self) -> i64 {
        let crossed = later.hour_index() - self.hour_index();
        if crossed < 0 { 0 } else { crossed }
    }

    #[must_use]
    pub const fn year(self) -> i64 {
        self.0.div_euclid(SECONDS_PER_YEAR) + EPOCH_YEAR
    }

    /// 1-based month of the year.
    #[must_use]
    pub const fn month(self) -> i64 {
        self.0.rem_euclid(SECONDS_PER_YEAR) / SECONDS_PER_MONTH + 1
    }

    /// 1-based day of the month.
    #[must_use]
    pub const fn day(self) -> i64 {
        self.0.rem_euclid(SECONDS_PER_MONTH) / SECONDS_PER_DAY + 1
    }

    #[must_use]
    pub const fn hour(self) -> i64 {
        self.0.rem_euclid(SECONDS_PER_DAY) / SECONDS_PER_HOUR
    }

    #[must_use]
    pub const fn minute(self) -> i64 {
        self.0.rem_euclid(SECONDS_PER_HOUR) / SECONDS_PER_MINUTE
    }

    #[must_use]
    pub const fn second(self) -> i64 {
        self.0.rem_euclid(SECONDS_PER_MINUTE)
    }

    /// Build an instant from calendar fields (month and day are 1-based).
    ///
    /// # Errors
    ///
    /// Returns `TimeParseError::Range` when a field exceeds its calendar ratio.
    pub fn from_calendar(
        year: i64,
        month: i64,
        day: i64,
        hour: i64,
        minute: i64,
        second: i64,
    ) -> Result<Self, TimeParseError> {
        check_range("month", month, 1, MONTHS_PER_YEAR)?;
        check_range("day", day, 1, DAYS_PER_MONTH)?;
        check_range("hour", hour, 0, HOURS_PER_DAY - 1)?;
        check_range("minute", minute, 0, MINUTES_PER_HOUR - 1)?;
        check_range("second", second, 0, SECONDS_PER_MINUTE - 1)?;
        Ok(Self(
            (year - EPOCH_YEAR) * SECONDS_PER_YEAR
                + (month - 1) * SECONDS_PER_MONTH
                + (day - 1) * SECONDS_PER_DAY
                + hour * SECONDS_PER_HOUR
                + minute * SECONDS_PER_MINUTE
                + second,
        ))
    }
}

fn check_range(field: &'static str, value: i64, min: i64, max: i64) -> Result<(), TimeParseError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(TimeParseError::Range { field, value })
    }
}

impl TimeDuration {
    /// Unset/invalid span, distinct from `ZERO`.
    pub const NONE: Self = Self(i64::MIN);
    pub const ZERO: Self = Self(0);

    #[must_use]
    pub const fn from_seconds(seconds: i64) -> Self {
        Self(seconds)
    }

    #[must_use]
    pub const fn from_minutes(minutes: i64) -> Self {
        Self(minutes * SECONDS_PER_MINUTE)
    }

    #[must_use]
    pub const fn from_hours(hours: i64) -> Self {
        Self(hours * SECONDS_PER_HOUR)
    }

    #[must_use]
    pub const fn from_days(days: i64) -> Self {
        Self(days * SECONDS_PER_DAY)
    }

    #[must_use]
    pub const fn from_years(years: i64) -> Self {
        Self(years * SECONDS_PER_YEAR)
    }

    /// Span of a fractional number of hours, rounded to the nearest second.
    #[must_use]
    pub fn from_hours_f64(hours: f64) -> Self {
        Self(round_f64_to_i64(hours * crate::numbers::i64_to_f64(SECONDS_PER_HOUR)))
    }

    #[must_use]
    pub const fn seconds(self) -> i64 {
        self.0
    }

    #[must_use]
    pub fn as_hours_f64(self) -> f64 {
        crate::numbers::i64_to_f64(self.0) / crate::numbers::i64_to_f64(SECONDS_PER_HOUR)
    }

    #[must_use]
    pub const fn is_none(self) -> bool {
        self.0 == i64::MIN
    }

    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.0 < 0 && !self.is_none()
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl Add<TimeDuration> for TimePoint {
    type Output = Self;

    fn add(self, rhs: TimeDuration) -> Self {
        debug_assert!(self.is_valid() && !rhs.is_none(), "arithmetic on NONE time");
        Self(self.0 + rhs.0)
    }
}

impl AddAssign<TimeDuration> for TimePoint {
    fn add_assign(&mut self, rhs: TimeDuration) {
        *self = *self + rhs;
    }
}

impl Sub<TimeDuration> for TimePoint {
    type Output = Self;

    fn sub(self, rhs: TimeDuration) -> Self {
        debug_assert!(self.is_valid() && !rhs.is_none(), "arithmetic on NONE time");
        Self(self.0 - rhs.0)
    }
}

impl SubAssign<TimeDuration> for TimePoint {
    fn sub_assign(&mut self, rhs: TimeDuration) {
        *self = *self - rhs;
    }
}

impl Sub for TimePoint {
    type Output = TimeDuration;

    fn sub(self, rhs: Self) -> TimeDuration {
        debug_assert!(self.is_valid() && rhs.is_valid(), "arithmetic on NONE time");
        TimeDuration(self.0 - rhs.0)
    }
}

impl Add for TimeDuration {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        debug_assert!(!self.is_none() && !rhs.is_none(), "arithmetic on NONE duration");
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for TimeDuration {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for TimeDuration {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        debug_assert!(!self.is_none() && !rhs.is_none(), "arithmetic on NONE duration");
        Self(self.0 - rhs.0)
    }
}

impl Neg for TimeDuration {
    type Output = Self;

    fn neg(self) -> Self {
        debug_assert!(!self.is_none(), "arithmetic on NONE duration");
        Self(-self.0)
    }
}

impl Mul<i64> for TimeDuration {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self {
        debug_assert!(!self.is_none(), "arithmetic on NONE duration");
        Self(self.0 * rhs)
    }
}

impl Mul<f64> for TimeDuration {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        debug_assert!(!self.is_none(), "arithmetic on NONE duration");
        Self(round_f64_to_i64(crate::numbers::i64_to_f64(self.0) * rhs))
    }
}

/// Ratio of two spans.
impl Div for TimeDuration {
    type Output = f64;

    fn div(self, rhs: Self) -> f64 {
        debug_assert!(!self.is_none() && !rhs.is_none(), "arithmetic on NONE duration");
        crate::numbers::i64_to_f64(self.0) / crate::numbers::i64_to_f64(rhs.0)
    }
}

impl fmt::Display for TimePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            return f.write_str("--");
        }
        write!(
            f,
            "{}.{:02}.{:02} {:02}:{:02}:{:02}",
            self.year(),
            self.month(),
            self.day(),
            self.hour(),
            self.minute(),
            self.second()
        )
    }
}

impl FromStr for TimePoint {
    type Err = TimeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let format_err = || TimeParseError::Format(s.to_string());
        let (date, clock) = s.trim().split_once(' ').ok_or_else(format_err)?;
        let date: Vec<&str> = date.split('.').collect();
        let clock: Vec<&str> = clock.trim().split(':').collect();
        if date.len() != 3 || clock.len() != 3 {
            return Err(format_err());
        }
        let field = |raw: &str| raw.parse::<i64>().map_err(|_| format_err());
        Self::from_calendar(
            field(date[0])?,
            field(date[1])?,
            field(date[2])?,
            field(clock[0])?,
            field(clock[1])?,
            field(clock[2])?,
        )
    }
}

impl fmt::Display for TimeDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            return f.write_str("--");
        }
        if self.0 == 0 {
            return f.write_str("0s");
        }
        let sign = if self.0 < 0 { "-" } else { "" };
        let total = self.0.unsigned_abs();
        let parts = [
            (total / SECONDS_PER_DAY.unsigned_abs(), "d"),
            (
                total % SECONDS_PER_DAY.unsigned_abs() / SECONDS_PER_HOUR.unsigned_abs(),
                "h",
            ),
            (
                total % SECONDS_PER_HOUR.unsigned_abs() / SECONDS_PER_MINUTE.unsigned_abs(),
                "m",
            ),
            (total % SECONDS_PER_MINUTE.unsigned_abs(), "s"),
        ];
        let rendered: Vec<String> = parts
            .iter()
            .filter(|(value, _)| *value > 0)
            .map(|(value, unit)| format!("{value}{unit}"))
            .collect();
        write!(f, "{sign}{}", rendered.join(" "))
    }
}

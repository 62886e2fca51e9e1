//! Minute-resolution timestamps and intervals.
//!
//! Every timestamp crossing the store or the CLI uses the fixed-width
//! `YYYY-MM-DD HH:MM` form (24-hour, zero-padded, no time zone). Because the
//! form is fixed-width, the store can compare the text lexically and get the
//! chronological order; [`Timestamp`] guarantees nothing else is ever written.

use std::{fmt, str::FromStr};

use chrono::{Datelike, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";
pub const TIME_OF_DAY_FORMAT: &str = "%H:%M";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimeError {
    #[error("`{0}` is not a `YYYY-MM-DD HH:MM` timestamp")]
    MalformedTimestamp(String),

    #[error("`{0}` is not a `HH:MM` time of day")]
    MalformedTimeOfDay(String),

    #[error("year in `{0}` must have exactly four digits")]
    YearOutOfRange(String),

    #[error("interval {start} - {end} does not end after it starts")]
    EmptyInterval { start: String, end: String },
}

/// A point in time with minute resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timestamp(NaiveDateTime);

impl Timestamp {
    /// Parses `YYYY-MM-DD HH:MM`. Surrounding whitespace is ignored; seconds
    /// or any other trailing input are rejected.
    pub fn parse(s: &str) -> Result<Self, TimeError> {
        let s = s.trim();
        let parsed = NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
            .map_err(|_| TimeError::MalformedTimestamp(s.to_owned()))?;
        if !(1000..=9999).contains(&parsed.year()) {
            return Err(TimeError::YearOutOfRange(s.to_owned()));
        }
        Ok(Self(parsed))
    }

    /// Signed number of whole minutes from `self` to `later`.
    pub fn minutes_until(&self, later: &Timestamp) -> i64 {
        (later.0 - self.0).num_minutes()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(TIMESTAMP_FORMAT))
    }
}

impl FromStr for Timestamp {
    type Err = TimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Timestamp {
    type Error = TimeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Timestamp> for String {
    fn from(value: Timestamp) -> Self {
        value.to_string()
    }
}

/// A half-open interval `[start, end)` with `start < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "IntervalBounds")]
pub struct TimeInterval {
    start: Timestamp,
    end: Timestamp,
}

impl TimeInterval {
    pub fn new(start: Timestamp, end: Timestamp) -> Result<Self, TimeError> {
        if start >= end {
            return Err(TimeError::EmptyInterval {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self { start, end })
    }

    pub fn parse(start: &str, end: &str) -> Result<Self, TimeError> {
        Self::new(Timestamp::parse(start)?, Timestamp::parse(end)?)
    }

    pub fn start(&self) -> Timestamp {
        self.start
    }

    pub fn end(&self) -> Timestamp {
        self.end
    }

    /// Two intervals overlap iff each starts before the other ends.
    /// Intervals that only touch (`a.end == b.start`) do not overlap.
    pub fn overlaps(&self, other: &TimeInterval) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn duration_minutes(&self) -> i64 {
        self.start.minutes_until(&self.end)
    }
}

#[derive(Deserialize)]
struct IntervalBounds {
    start: Timestamp,
    end: Timestamp,
}

impl TryFrom<IntervalBounds> for TimeInterval {
    type Error = TimeError;

    fn try_from(value: IntervalBounds) -> Result<Self, Self::Error> {
        Self::new(value.start, value.end)
    }
}

impl fmt::Display for TimeInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.start, self.end)
    }
}

/// A wall-clock time of day, `HH:MM`, used by availability windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay(NaiveTime);

impl TimeOfDay {
    pub fn parse(s: &str) -> Result<Self, TimeError> {
        let s = s.trim();
        NaiveTime::parse_from_str(s, TIME_OF_DAY_FORMAT)
            .map(Self)
            .map_err(|_| TimeError::MalformedTimeOfDay(s.to_owned()))
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(TIME_OF_DAY_FORMAT))
    }
}

impl FromStr for TimeOfDay {
    type Err = TimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = TimeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TimeOfDay> for String {
    fn from(value: TimeOfDay) -> Self {
        value.to_string()
    }
}

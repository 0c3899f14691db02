//! Report periods and inclusive date ranges (UTC calendar).

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PeriodError {
    #[error("invalid period '{0}': use 'monthly' or 'annual'")]
    InvalidPeriod(String),

    #[error("invalid date '{0}'")]
    InvalidDate(String),

    #[error("date out of supported range")]
    OutOfRange,
}

/// Closed set of report periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportPeriod {
    Monthly,
    Annual,
}

impl ReportPeriod {
    pub fn as_str(self) -> &'static str {
        match self {
            ReportPeriod::Monthly => "monthly",
            ReportPeriod::Annual => "annual",
        }
    }

    /// The calendar month or year containing `now`.
    pub fn range_at(self, now: DateTime<Utc>) -> Result<DateRange, PeriodError> {
        match self {
            ReportPeriod::Monthly => DateRange::month_of(now),
            ReportPeriod::Annual => DateRange::year_of(now),
        }
    }
}

impl core::str::FromStr for ReportPeriod {
    type Err = PeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "monthly" => Ok(ReportPeriod::Monthly),
            "annual" => Ok(ReportPeriod::Annual),
            other => Err(PeriodError::InvalidPeriod(other.to_string())),
        }
    }
}

impl core::fmt::Display for ReportPeriod {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Time range with **both** bounds inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }

    /// Empty when `start` is after `end`; such a range contains nothing.
    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    pub fn day_of(now: DateTime<Utc>) -> Result<Self, PeriodError> {
        let day = now.date_naive();
        Ok(Self::new(start_of_day(day), end_of_day(day)?))
    }

    pub fn month_of(now: DateTime<Utc>) -> Result<Self, PeriodError> {
        let (year, month) = (now.year(), now.month());
        let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or(PeriodError::OutOfRange)?;
        let next_first = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        }
        .ok_or(PeriodError::OutOfRange)?;
        let last = next_first.pred_opt().ok_or(PeriodError::OutOfRange)?;
        Ok(Self::new(start_of_day(first), end_of_day(last)?))
    }

    pub fn year_of(now: DateTime<Utc>) -> Result<Self, PeriodError> {
        let year = now.year();
        let first = NaiveDate::from_ymd_opt(year, 1, 1).ok_or(PeriodError::OutOfRange)?;
        let last = NaiveDate::from_ymd_opt(year, 12, 31).ok_or(PeriodError::OutOfRange)?;
        Ok(Self::new(start_of_day(first), end_of_day(last)?))
    }
}

fn start_of_day(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::MIN).and_utc()
}

fn end_of_day(day: NaiveDate) -> Result<DateTime<Utc>, PeriodError> {
    start_of_day(day)
        .checked_add_signed(Duration::days(1))
        .and_then(|next| next.checked_sub_signed(Duration::nanoseconds(1)))
        .ok_or(PeriodError::OutOfRange)
}

/// Parse a boundary instant.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS` (UTC) and
/// bare `YYYY-MM-DD` (midnight UTC).
pub fn parse_instant(raw: &str) -> Result<DateTime<Utc>, PeriodError> {
    let s = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(day) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(start_of_day(day));
    }
    Err(PeriodError::InvalidDate(raw.to_string()))
}

/// Blank or missing input means "use the default".
pub fn parse_optional_instant(raw: Option<&str>) -> Result<Option<DateTime<Utc>>, PeriodError> {
    match raw {
        Some(s) if !s.trim().is_empty() => parse_instant(s).map(Some),
        _ => Ok(None),
    }
}

//! Payment period model.
//!
//! Payroll runs monthly; a [`PaymentPeriod`] is a calendar month written
//! `YYYY-MM`. Formula resolution uses the first day of the period as its
//! "as of" date.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// A calendar month for which a payslip is generated.
///
/// # Example
///
/// ```
/// use payroll_engine::models::PaymentPeriod;
/// use chrono::NaiveDate;
///
/// let period: PaymentPeriod = "2024-02".parse().unwrap();
/// assert_eq!(period.first_day(), NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
/// assert_eq!(period.last_day(), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
/// assert_eq!(period.to_string(), "2024-02");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PaymentPeriod {
    first_day: NaiveDate,
}

impl PaymentPeriod {
    /// Creates the period for `year`/`month`, or `None` for an invalid month.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|first_day| Self { first_day })
    }

    /// The period containing `date`.
    pub fn containing(date: NaiveDate) -> Self {
        Self {
            first_day: date.with_day(1).unwrap_or(date),
        }
    }

    /// First day of the month (inclusive).
    pub fn first_day(&self) -> NaiveDate {
        self.first_day
    }

    /// Last day of the month (inclusive).
    pub fn last_day(&self) -> NaiveDate {
        self.first_day
            .checked_add_months(Months::new(1))
            .and_then(|next| next.pred_opt())
            .unwrap_or(self.first_day)
    }

    /// Returns true if `date` falls within the period.
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.first_day && date <= self.last_day()
    }

    /// The period `months` months after this one.
    pub fn plus_months(&self, months: u32) -> Option<Self> {
        self.first_day
            .checked_add_months(Months::new(months))
            .map(|first_day| Self { first_day })
    }
}

impl FromStr for PaymentPeriod {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || {
            EngineError::validation(
                "payment_period",
                format!("'{}' is not a valid payment period (expected YYYY-MM)", s),
            )
        };
        let trimmed = s.trim();
        // A full date is accepted and truncated to its month.
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
            return Ok(Self::containing(date));
        }
        let (year, month) = trimmed.split_once('-').ok_or_else(invalid)?;
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        Self::new(year, month).ok_or_else(invalid)
    }
}

impl TryFrom<String> for PaymentPeriod {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PaymentPeriod> for String {
    fn from(value: PaymentPeriod) -> Self {
        value.to_string()
    }
}

impl fmt::Display for PaymentPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.first_day.year(), self.first_day.month())
    }
}

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::{BankError, Result};

const YEAR_OFFSET: i32 = 1900;
const COMPONENT_SEPARATOR: char = '-';

/// Account creation time in broken-down local time, stored the way a C
/// `struct tm` holds it: years since 1900 and a zero-based month.
///
/// Serialized as the six components joined by dashes, e.g. `125-9-19-14-3-7`
/// for 2025-10-19 14:03:07.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CreationTimestamp {
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
}

impl CreationTimestamp {
    pub fn now() -> Self {
        Self::from_naive(Local::now().naive_local())
    }

    pub fn from_naive(datetime: NaiveDateTime) -> Self {
        CreationTimestamp {
            year: datetime.year() - YEAR_OFFSET,
            month: datetime.month0(),
            day: datetime.day(),
            hour: datetime.hour(),
            minute: datetime.minute(),
            second: datetime.second(),
        }
    }

    pub fn to_naive(&self) -> Result<NaiveDateTime> {
        let year = self.year.checked_add(YEAR_OFFSET);
        let month = self.month.checked_add(1);
        year.zip(month)
            .and_then(|(year, month)| NaiveDate::from_ymd_opt(year, month, self.day))
            .and_then(|date| date.and_hms_opt(self.hour, self.minute, self.second))
            .ok_or_else(|| BankError::InvalidRow(format!("timestamp {self} is not a calendar date")))
    }

    /// Whole seconds between this timestamp and `now`, negative if `now` is earlier.
    pub fn seconds_until(&self, now: NaiveDateTime) -> Result<i64> {
        Ok((now - self.to_naive()?).num_seconds())
    }

    /// Human readable form used by the account tables, e.g. `Sun Oct 19 14:03:07 2025`.
    pub fn to_human(&self) -> Result<String> {
        Ok(self.to_naive()?.format("%a %b %e %H:%M:%S %Y").to_string())
    }
}

impl fmt::Display for CreationTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}-{}-{}-{}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

impl FromStr for CreationTimestamp {
    type Err = BankError;

    fn from_str(s: &str) -> Result<Self> {
        let components = s
            .split(COMPONENT_SEPARATOR)
            .map(|part| part.trim().parse::<u32>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| BankError::InvalidRow(format!("timestamp {s:?}: {e}")))?;

        let [year, month, day, hour, minute, second] = components[..] else {
            return Err(BankError::InvalidRow(format!(
                "timestamp {s:?} must have 6 components, found {}",
                components.len()
            )));
        };

        let year = i32::try_from(year)
            .map_err(|e| BankError::InvalidRow(format!("timestamp {s:?}: {e}")))?;
        Ok(CreationTimestamp {
            year,
            month,
            day,
            hour,
            minute,
            second,
        })
    }
}

impl TryFrom<String> for CreationTimestamp {
    type Error = BankError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<CreationTimestamp> for String {
    fn from(timestamp: CreationTimestamp) -> String {
        timestamp.to_string()
    }
}

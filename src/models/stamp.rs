use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{ProcessingError, Result};

/// Seconds represented by one unit of the stamp's time part.
const STAMP_RESOLUTION_SECONDS: i64 = 8;

/// Stamp values that never denote a date.
const UNDEFINED_STAMPS: [u32; 3] = [0, 10_101_011, 101_010_101];

/// Packed date-time stamp: `10 * (seconds since 1980-01-01 / 8) + run`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DateStamp(pub u32);

impl DateStamp {
    pub fn undefined() -> Self {
        DateStamp(0)
    }

    pub fn from_datetime(datetime: NaiveDateTime, run: u8) -> Result<Self> {
        if run > 9 {
            return Err(ProcessingError::InvalidFormat(format!(
                "Run number {} must be a single digit",
                run
            )));
        }

        let seconds = (datetime - epoch()?).num_seconds();
        let units = u32::try_from(seconds / STAMP_RESOLUTION_SECONDS)
            .ok()
            .filter(|_| seconds >= 0)
            .and_then(|units| units.checked_mul(10))
            .and_then(|stamp| stamp.checked_add(u32::from(run)))
            .ok_or_else(|| {
                ProcessingError::InvalidFormat(format!("{} cannot be stamped", datetime))
            })?;

        Ok(DateStamp(units))
    }

    pub fn is_undefined(&self) -> bool {
        UNDEFINED_STAMPS.contains(&self.0)
    }

    pub fn run(&self) -> u8 {
        (self.0 % 10) as u8
    }

    pub fn to_datetime(&self) -> Option<NaiveDateTime> {
        if self.is_undefined() {
            return None;
        }
        let seconds = i64::from(self.0 / 10) * STAMP_RESOLUTION_SECONDS;
        Some(epoch().ok()? + chrono::Duration::seconds(seconds))
    }

    /// Advance by `seconds`; undefined stamps stay undefined.
    pub fn add_seconds(&self, seconds: i64) -> Self {
        if self.is_undefined() || seconds == 0 {
            return *self;
        }

        let total = i64::from(self.0 / 10) * STAMP_RESOLUTION_SECONDS + seconds;
        if total < 0 {
            return Self::undefined();
        }

        u32::try_from(total / STAMP_RESOLUTION_SECONDS)
            .ok()
            .and_then(|units| units.checked_mul(10))
            .and_then(|stamp| stamp.checked_add(u32::from(self.run())))
            .map(DateStamp)
            .unwrap_or_else(Self::undefined)
    }
}

impl std::fmt::Display for DateStamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.to_datetime() {
            Some(datetime) => write!(f, "{}", datetime.format("%Y-%m-%d %H:%M:%S")),
            None => write!(f, "undefined"),
        }
    }
}

fn epoch() -> Result<NaiveDateTime> {
    NaiveDate::from_ymd_opt(1980, 1, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or_else(|| ProcessingError::InvalidFormat("Invalid stamp epoch".to_string()))
}

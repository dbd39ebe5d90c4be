use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// The single timezone reference used to turn an instant into a ledger day.
///
/// The store derives `today` through this and nothing else, so every
/// completion lands on the same calendar regardless of the caller's clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DayBoundary {
    utc_offset_minutes: i32,
}

impl DayBoundary {
    pub fn utc() -> Self {
        Self::default()
    }

    pub fn from_offset_minutes(utc_offset_minutes: i32) -> Result<Self, ValidationError> {
        if FixedOffset::east_opt(utc_offset_minutes.saturating_mul(60)).is_none() {
            return Err(ValidationError::InvalidValue {
                field: "utc_offset_minutes".into(),
                message: format!("{utc_offset_minutes} is outside (-1440, 1440)"),
            });
        }
        Ok(Self { utc_offset_minutes })
    }

    pub fn utc_offset_minutes(&self) -> i32 {
        self.utc_offset_minutes
    }

    /// Calendar date of `instant` in this reference.
    pub fn day_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        match FixedOffset::east_opt(self.utc_offset_minutes.saturating_mul(60)) {
            Some(offset) => instant.with_timezone(&offset).date_naive(),
            None => instant.date_naive(),
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.day_of(Utc::now())
    }
}

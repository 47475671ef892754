//! Date handling and timing constants for the ingestion engine.

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

use crate::error::{Result, ValidationError};

/// Timing constants shared by the ingestion controllers.
pub mod constants {
    use std::time::Duration;

    /// Nap taken by the on-demand controller when the queue is empty (5 minutes).
    pub const QUEUE_IDLE_SLEEP: Duration = Duration::from_secs(5 * 60);

    /// How often stale task locks are reclaimed (1 hour).
    pub const STALE_LOCK_CHECK_INTERVAL: Duration = Duration::from_secs(60 * 60);

    /// Age after which a task lock is considered dead (1 hour).
    pub const LOCK_DEAD_TIME: Duration = Duration::from_secs(60 * 60);

    /// Nap taken by the continuous range walker after finishing a window (6 hours).
    pub const RANGE_NAP: Duration = Duration::from_secs(6 * 3600);

    /// Cooldown after a provider reports its quota exceeded (24 hours).
    pub const QUOTA_COOLDOWN: Duration = Duration::from_secs(24 * 3600);
}

/// A timestamp, always UTC.
pub type Timestamp = DateTime<Utc>;

/// Current timestamp.
pub fn now() -> Timestamp {
    Utc::now()
}

/// Current calendar day in the host's local time zone.
///
/// Decides between latest and historical provider requests and where the
/// continuous range walker restarts.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Midnight of the given day.
pub fn midnight(date: NaiveDate) -> Timestamp {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::default()))
}

/// Push a processing date forward by exactly one calendar day.
pub fn postpone(timestamp: Timestamp) -> Timestamp {
    timestamp + Duration::days(1)
}

/// Anything that can be turned into an exchange date.
///
/// Time-of-day is always discarded.
pub trait IntoExchangeDate {
    fn into_exchange_date(self) -> Result<NaiveDate>;
}

impl IntoExchangeDate for NaiveDate {
    fn into_exchange_date(self) -> Result<NaiveDate> {
        Ok(self)
    }
}

impl IntoExchangeDate for NaiveDateTime {
    fn into_exchange_date(self) -> Result<NaiveDate> {
        Ok(self.date())
    }
}

impl<Tz: TimeZone> IntoExchangeDate for DateTime<Tz> {
    fn into_exchange_date(self) -> Result<NaiveDate> {
        Ok(self.date_naive())
    }
}

impl IntoExchangeDate for &str {
    fn into_exchange_date(self) -> Result<NaiveDate> {
        parse_exchange_date(self)
    }
}

impl IntoExchangeDate for String {
    fn into_exchange_date(self) -> Result<NaiveDate> {
        parse_exchange_date(&self)
    }
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d.%m.%Y"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse a date or datetime string, keeping only the calendar day.
pub fn parse_exchange_date(input: &str) -> Result<NaiveDate> {
    let s = input.trim();

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return Ok(date);
        }
    }

    if let Ok(datetime) = DateTime::parse_from_rfc3339(s) {
        return Ok(datetime.date_naive());
    }

    for format in DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(datetime.date());
        }
    }

    Err(ValidationError::InvalidDate(input.to_string()))
}

/// Serde adapter storing a calendar day as its midnight timestamp.
pub mod midnight_timestamp {
    use chrono::{DateTime, NaiveDate, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::midnight(*date).to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if let Ok(timestamp) = raw.parse::<DateTime<Utc>>() {
            return Ok(timestamp.date_naive());
        }
        super::parse_exchange_date(&raw).map_err(serde::de::Error::custom)
    }
}

//! Typed positions request built from raw query parameters.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use ephem_core::{BodyId, Center, EphemError, Result, StepSpec};

/// Naive layouts accepted in addition to RFC 3339. Naive values are UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// A request for the positions of a body over a time range.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionsRequest {
    /// Target body.
    pub body: BodyId,
    /// Observation center.
    pub center: Center,
    /// Requested start (not yet aligned).
    pub start: DateTime<Utc>,
    /// Requested stop (not yet aligned).
    pub stop: DateTime<Utc>,
    /// Sampling cadence.
    pub step: StepSpec,
}

impl PositionsRequest {
    /// Creates a request from typed parts.
    #[must_use]
    pub const fn new(
        body: BodyId,
        center: Center,
        start: DateTime<Utc>,
        stop: DateTime<Utc>,
        step: StepSpec,
    ) -> Self {
        Self {
            body,
            center,
            start,
            stop,
            step,
        }
    }

    /// Parses the five raw request parameters.
    ///
    /// # Errors
    /// Returns [`EphemError::MalformedParameter`] for a bad body or center,
    /// [`EphemError::MalformedTimestamp`] for a bad time or a stop earlier
    /// than the start, and [`EphemError::MalformedStep`] for a bad step.
    pub fn parse(body: &str, center: &str, start: &str, stop: &str, step: &str) -> Result<Self> {
        let body = body.parse()?;
        let center = center.parse()?;
        let start_time = parse_timestamp(start)?;
        let stop_time = parse_timestamp(stop)?;
        if stop_time < start_time {
            return Err(EphemError::MalformedTimestamp(format!(
                "stop {} is earlier than start {}",
                stop.trim(),
                start.trim()
            )));
        }

        Ok(Self::new(body, center, start_time, stop_time, step.parse()?))
    }
}

/// Parses a request timestamp.
///
/// Accepts RFC 3339, `YYYY-MM-DDTHH:MM[:SS[.f]]`, the same with a space
/// separator, and a bare `YYYY-MM-DD` meaning midnight.
///
/// # Errors
/// Returns [`EphemError::MalformedTimestamp`] if no layout matches.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let s = raw.trim();

    if let Ok(time) = DateTime::parse_from_rfc3339(s) {
        return Ok(time.with_timezone(&Utc));
    }

    if let Some(naive) = NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
    {
        return Ok(naive.and_utc());
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| EphemError::MalformedTimestamp(raw.to_string()))
}

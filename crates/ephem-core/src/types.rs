//! Core data types for orbital-element ephemerides.
//!
//! This module defines the fundamental data structures:
//!
//! - [`BodyId`] - External identifier of a celestial object
//! - [`Center`] - Observation center code (reference frame)
//! - [`Body`] - A tracked object and its valid ephemeris bounds
//! - [`OrbitalElements`] - The six stored orbital elements
//! - [`Position`] - One timestamped element sample
//! - [`PositionKey`] - The (body, center, time) uniqueness triple

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::EphemError;

/// Identifier assigned to a body by the remote service (e.g. 399 for Earth).
///
/// Spacecraft use negative identifiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BodyId(i64);

impl BodyId {
    /// Creates a body identifier.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw identifier.
    #[must_use]
    pub const fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for BodyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BodyId {
    type Err = EphemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map(Self)
            .map_err(|e| EphemError::MalformedParameter(format!("orbital body id `{s}`: {e}")))
    }
}

impl From<i64> for BodyId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Observation center code, e.g. `"500@10"` (Sun body center) or `"@0"`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Center(String);

impl Center {
    /// Creates a center code, trimming surrounding whitespace.
    ///
    /// # Errors
    /// Returns [`EphemError::MalformedParameter`] if the code is empty.
    pub fn new(code: impl AsRef<str>) -> Result<Self, EphemError> {
        let code = code.as_ref().trim();
        if code.is_empty() {
            return Err(EphemError::MalformedParameter(
                "center must not be empty".to_string(),
            ));
        }
        Ok(Self(code.to_string()))
    }

    /// Returns the center code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Center {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Center {
    type Err = EphemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// A celestial object tracked by the cache.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Body {
    /// External identifier.
    pub id: BodyId,
    /// Display name reported by the remote service.
    pub name: String,
    /// Earliest instant the remote service has elements for.
    pub first_ephemeris_date: DateTime<Utc>,
    /// Latest instant the remote service has elements for.
    pub last_ephemeris_date: DateTime<Utc>,
}

impl Body {
    /// Creates a body with unrestricted ephemeris bounds.
    #[must_use]
    pub fn new(id: BodyId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            first_ephemeris_date: Self::earliest_representable(),
            last_ephemeris_date: Self::latest_representable(),
        }
    }

    /// Sets the ephemeris bounds.
    #[must_use]
    pub const fn with_bounds(mut self, first: DateTime<Utc>, last: DateTime<Utc>) -> Self {
        self.first_ephemeris_date = first;
        self.last_ephemeris_date = last;
        self
    }

    /// Default lower bound, 0001-01-01T00:00:00Z.
    #[must_use]
    pub fn earliest_representable() -> DateTime<Utc> {
        NaiveDate::from_ymd_opt(1, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map_or(DateTime::<Utc>::MIN_UTC, |naive| naive.and_utc())
    }

    /// Default upper bound, 9999-12-31T23:59:59.999999Z.
    #[must_use]
    pub fn latest_representable() -> DateTime<Utc> {
        NaiveDate::from_ymd_opt(9999, 12, 31)
            .and_then(|d| d.and_hms_micro_opt(23, 59, 59, 999_999))
            .map_or(DateTime::<Utc>::MAX_UTC, |naive| naive.and_utc())
    }

    /// Returns true if `time` lies within the body's ephemeris bounds.
    #[must_use]
    pub fn covers(&self, time: DateTime<Utc>) -> bool {
        self.first_ephemeris_date <= time && time <= self.last_ephemeris_date
    }
}

impl fmt::Display for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// The six orbital elements stored per sample.
///
/// Distances are in AU, angles in degrees.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OrbitalElements {
    /// Semi-major axis (AU).
    pub semimajor_axis: f64,
    /// Eccentricity.
    pub eccentricity: f64,
    /// Inclination (degrees).
    pub inclination: f64,
    /// Mean longitude (degrees).
    pub mean_longitude: f64,
    /// Longitude of periapsis (degrees).
    pub longitude_of_periapsis: f64,
    /// Longitude of the ascending node (degrees).
    pub longitude_of_ascending_node: f64,
}

/// One timestamped orbital-elements sample for a body seen from a center.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Owning body.
    #[serde(rename = "orbital_body")]
    pub body: BodyId,
    /// Observation center.
    pub center: Center,
    /// Sample time.
    pub time: DateTime<Utc>,
    /// Orbital elements at `time`.
    #[serde(flatten)]
    pub elements: OrbitalElements,
}

impl Position {
    /// Creates a position sample.
    #[must_use]
    pub const fn new(
        body: BodyId,
        center: Center,
        time: DateTime<Utc>,
        elements: OrbitalElements,
    ) -> Self {
        Self {
            body,
            center,
            time,
            elements,
        }
    }

    /// Returns the uniqueness key of this sample.
    #[must_use]
    pub fn key(&self) -> PositionKey {
        PositionKey {
            body: self.body,
            center: self.center.clone(),
            time: self.time,
        }
    }
}

/// The (body, center, time) triple that identifies a stored position.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PositionKey {
    /// Owning body.
    pub body: BodyId,
    /// Observation center.
    pub center: Center,
    /// Sample time.
    pub time: DateTime<Utc>,
}

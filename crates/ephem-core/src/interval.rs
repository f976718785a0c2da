//! Interval unit definitions.
//!
//! This module defines [`Interval`], the granularity used both for stepping
//! through a requested range and for aligning its bounds.

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::EphemError;

/// Granularity of time stepping.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    /// One calendar day ("d").
    #[serde(rename = "d")]
    Day,
    /// One hour ("h").
    #[serde(rename = "h")]
    Hour,
    /// One minute ("min").
    #[serde(rename = "min")]
    Minute,
}

impl Interval {
    /// Returns the unit token used in step descriptors.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "d",
            Self::Hour => "h",
            Self::Minute => "min",
        }
    }

    /// Returns the length of one unit in seconds.
    #[must_use]
    pub const fn seconds(&self) -> i64 {
        match self {
            Self::Day => 86_400,
            Self::Hour => 3_600,
            Self::Minute => 60,
        }
    }

    /// Returns one unit as a [`TimeDelta`].
    #[must_use]
    pub fn delta(&self) -> TimeDelta {
        TimeDelta::seconds(self.seconds())
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = EphemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "d" => Ok(Self::Day),
            "h" => Ok(Self::Hour),
            "min" => Ok(Self::Minute),
            other => Err(EphemError::MalformedStep(format!(
                "unknown interval unit `{other}` (expected d, h or min)"
            ))),
        }
    }
}

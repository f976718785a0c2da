//! Step descriptor parsing.
//!
//! A step descriptor is the compact cadence string a client sends, such as
//! `"1d"`, `"6h"` or `"30min"`. The skip count is the first run of digits
//! found anywhere in the string and the unit is the trailing run of letters,
//! so `"1 d"` and `"x2y3h"` are accepted as `(1, d)` and `(2, h)`.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::error::{EphemError, Result};
use crate::interval::Interval;

static DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());
static TRAILING_LETTERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-zA-Z]*$").unwrap());

/// Parsed request cadence: every `skip` units of `interval`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StepSpec {
    skip: NonZeroU32,
    interval: Interval,
}

impl StepSpec {
    /// Creates a step from its parts.
    #[must_use]
    pub const fn new(skip: NonZeroU32, interval: Interval) -> Self {
        Self { skip, interval }
    }

    /// Parses a step descriptor.
    ///
    /// # Errors
    /// Returns [`EphemError::MalformedStep`] if the string has no digits, the
    /// skip is zero or too large, or the trailing letters are not `d`, `h` or `min`.
    pub fn parse(step: &str) -> Result<Self> {
        let digits = DIGITS
            .find(step)
            .ok_or_else(|| EphemError::MalformedStep(format!("no skip count in `{step}`")))?;
        let skip = digits
            .as_str()
            .parse::<u32>()
            .ok()
            .and_then(NonZeroU32::new)
            .ok_or_else(|| {
                EphemError::MalformedStep(format!(
                    "skip count `{}` must be between 1 and {}",
                    digits.as_str(),
                    u32::MAX
                ))
            })?;

        let unit = TRAILING_LETTERS
            .find(step)
            .map(|m| m.as_str())
            .unwrap_or_default();
        let interval = unit.parse::<Interval>()?;

        Ok(Self { skip, interval })
    }

    /// Returns the stride in interval units.
    #[must_use]
    pub const fn skip(&self) -> u32 {
        self.skip.get()
    }

    /// Returns the interval unit.
    #[must_use]
    pub const fn interval(&self) -> Interval {
        self.interval
    }
}

impl fmt::Display for StepSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.skip, self.interval)
    }
}

impl FromStr for StepSpec {
    type Err = EphemError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

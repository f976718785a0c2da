//! Remote ephemeris source trait.
//!
//! This module defines [`EphemerisSource`], the collaborator the cache falls
//! back to on a miss, together with its request and response types.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::{
    error::Result,
    step::StepSpec,
    types::{BodyId, Center, Position},
};

/// A request for orbital elements over an aligned window.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementsRequest {
    /// Target body.
    pub body: BodyId,
    /// Observation center.
    pub center: Center,
    /// Inclusive window start.
    pub start: DateTime<Utc>,
    /// Inclusive window stop.
    pub stop: DateTime<Utc>,
    /// Sampling cadence.
    pub step: StepSpec,
}

/// Parsed response to an [`ElementsRequest`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Ephemeris {
    /// Target name reported in the response header, if present.
    pub target_name: Option<String>,
    /// Element samples, in the order the source returned them.
    pub positions: Vec<Position>,
}

/// Earliest and latest instants a source has data for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EphemerisBounds {
    /// First instant with data.
    pub first: DateTime<Utc>,
    /// Last instant with data.
    pub last: DateTime<Utc>,
}

/// A remote service that produces orbital elements.
#[async_trait]
pub trait EphemerisSource: Send + Sync + Debug {
    /// Returns the name of this source (e.g. "JPL Horizons").
    fn name(&self) -> &str;

    /// Fetches orbital elements for the request window.
    async fn fetch_elements(&self, request: &ElementsRequest) -> Result<Ephemeris>;

    /// Discovers the span of dates the source has data for.
    ///
    /// Only called the first time a body is seen.
    async fn probe_bounds(&self, body: BodyId) -> Result<EphemerisBounds>;
}

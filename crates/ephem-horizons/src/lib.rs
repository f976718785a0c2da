#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/ephem/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! JPL Horizons ephemeris source.
//!
//! This crate implements the [`EphemerisSource`] trait from `ephem-core` for
//! the [JPL Horizons](https://ssd.jpl.nasa.gov/horizons/) API, requesting
//! osculating orbital elements in the plain-text CSV format.
//!
//! # Usage
//!
//! ```rust,ignore
//! use ephem_core::{BodyId, Center, ElementsRequest, EphemerisSource, StepSpec};
//! use ephem_horizons::HorizonsSource;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source = HorizonsSource::new(Duration::from_secs(30))?;
//!
//!     let request = ElementsRequest {
//!         body: BodyId::new(399),
//!         center: Center::new("500@10")?,
//!         start: "2020-01-01T00:00:00Z".parse()?,
//!         stop: "2020-01-02T00:00:00Z".parse()?,
//!         step: "1d".parse()?,
//!     };
//!     let ephemeris = source.fetch_elements(&request).await?;
//!
//!     let bounds = source.probe_bounds(BodyId::new(399)).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod parse;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use ephem_core::{
    BodyId, Center, ElementsRequest, EphemError, Ephemeris, EphemerisBounds, EphemerisSource,
    Interval, Result, StepSpec,
};
use reqwest::Client;
use std::fmt;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::{debug, instrument, warn};

pub use parse::{BoundEdge, parse_bound, parse_elements, parse_target_name};

/// Base URL for the Horizons API.
pub const HORIZONS_BASE_URL: &str = "https://ssd.jpl.nasa.gov/api/horizons.api";

/// Time format for `START_TIME` and `STOP_TIME`.
const QUERY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Center used when probing a body's ephemeris span.
const PROBE_CENTER: &str = "500@10";

/// JPL Horizons ephemeris source.
///
/// Provides access to:
/// - Osculating orbital elements for any Horizons target and center
/// - The span of dates a target has ephemeris data for
#[derive(Clone)]
pub struct HorizonsSource {
    client: Client,
    base_url: String,
}

impl fmt::Debug for HorizonsSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HorizonsSource")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HorizonsSource {
    /// Create a new Horizons source whose requests time out after `timeout`.
    ///
    /// # Errors
    /// Returns [`EphemError::RemoteFetch`] if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EphemError::RemoteFetch(e.to_string()))?;
        Ok(Self::with_client(client))
    }

    /// Create a new Horizons source with a custom HTTP client.
    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            base_url: HORIZONS_BASE_URL.to_string(),
        }
    }

    /// Point the source at a different API endpoint.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Returns the API endpoint in use.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build the query parameters for an elements request.
    ///
    /// Values are single-quoted as Horizons expects; reqwest URL-encodes them.
    fn query(request: &ElementsRequest) -> Vec<(&'static str, String)> {
        let quoted = |value: &dyn fmt::Display| format!("'{value}'");
        vec![
            ("format", "text".to_string()),
            ("COMMAND", quoted(&request.body)),
            ("OBJ_DATA", quoted(&"NO")),
            ("MAKE_EPHEM", quoted(&"YES")),
            ("EPHEM_TYPE", quoted(&"ELEMENTS")),
            ("CENTER", quoted(&request.center)),
            ("START_TIME", quoted(&request.start.format(QUERY_TIME_FORMAT))),
            ("STOP_TIME", quoted(&request.stop.format(QUERY_TIME_FORMAT))),
            ("STEP_SIZE", quoted(&request.step)),
            ("CSV_FORMAT", quoted(&"YES")),
            ("OUT_UNITS", quoted(&"AU-D")),
        ]
    }

    /// Make a GET request and return the response text.
    async fn get_text(&self, query: &[(&'static str, String)]) -> Result<String> {
        debug!("Horizons request: {:?}", query);

        let response = self
            .client
            .get(&self.base_url)
            .query(query)
            .send()
            .await
            .map_err(|e| EphemError::RemoteFetch(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(EphemError::RemoteFetch(format!("HTTP {status}: {text}")));
        }

        response
            .text()
            .await
            .map_err(|e| EphemError::RemoteFetch(e.to_string()))
    }

    /// One-day window anchored at `day`, used to probe a bound.
    fn probe_request(body: BodyId, day: NaiveDate) -> Result<ElementsRequest> {
        let start = day
            .and_hms_opt(0, 0, 0)
            .map(|naive| naive.and_utc())
            .ok_or_else(|| EphemError::MalformedTimestamp(day.to_string()))?;
        Ok(ElementsRequest {
            body,
            center: Center::new(PROBE_CENTER)?,
            start,
            stop: start + Interval::Day.delta(),
            step: StepSpec::new(NonZeroU32::MIN, Interval::Day),
        })
    }

    /// Resolve one edge of a body's ephemeris span.
    ///
    /// The probe window lies at the end of the representable range. Horizons
    /// answers with a diagnostic naming the real bound, or with data if the
    /// body genuinely reaches that far, in which case the probe date is the bound.
    async fn probe_edge(
        &self,
        body: BodyId,
        day: NaiveDate,
        edge: BoundEdge,
    ) -> Result<DateTime<Utc>> {
        let request = Self::probe_request(body, day)?;
        let text = self.get_text(&Self::query(&request)).await?;

        if let Some(bound) = parse_bound(&text, edge)? {
            return Ok(bound);
        }
        if !parse_elements(&text, body, &request.center)?.is_empty() {
            return Ok(request.start);
        }

        warn!(%body, ?edge, "Probe response carried neither data nor a bound");
        Err(EphemError::RemoteFormat(format!(
            "no {edge:?} ephemeris bound in response for body {body}"
        )))
    }
}

#[async_trait]
impl EphemerisSource for HorizonsSource {
    fn name(&self) -> &str {
        "JPL Horizons"
    }

    #[instrument(skip(self, request), fields(body = %request.body, center = %request.center, step = %request.step))]
    async fn fetch_elements(&self, request: &ElementsRequest) -> Result<Ephemeris> {
        let text = self.get_text(&Self::query(request)).await?;

        let mut positions = parse_elements(&text, request.body, &request.center)?;
        positions.sort_by_key(|p| p.time);
        let target_name = parse_target_name(&text, request.body);

        debug!("Fetched {} positions", positions.len());
        Ok(Ephemeris {
            target_name,
            positions,
        })
    }

    #[instrument(skip(self), fields(body = %body))]
    async fn probe_bounds(&self, body: BodyId) -> Result<EphemerisBounds> {
        let earliest = NaiveDate::from_ymd_opt(1, 1, 1)
            .ok_or_else(|| EphemError::MalformedTimestamp("0001-01-01".to_string()))?;
        let latest = NaiveDate::from_ymd_opt(9999, 12, 30)
            .ok_or_else(|| EphemError::MalformedTimestamp("9999-12-30".to_string()))?;

        let first = self.probe_edge(body, earliest, BoundEdge::Prior).await?;
        let last = self.probe_edge(body, latest, BoundEdge::After).await?;

        debug!(%first, %last, "Probed ephemeris bounds");
        Ok(EphemerisBounds { first, last })
    }
}

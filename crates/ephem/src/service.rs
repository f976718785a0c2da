//! Cache-first ephemeris service.
//!
//! [`EphemerisService`] answers a [`PositionsRequest`] from the store when the
//! cached rows cover every timestamp of the aligned request grid, and
//! otherwise fetches the whole window from the remote source. Writing fresh
//! data back is left to the caller through [`PendingWrite`], so the response
//! never waits on the store.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use ephem_core::{
    Body, BodyId, DateGrid, ElementsRequest, EphemError, EphemerisSource, EphemerisStore,
    Position, Reconciliation, Result, reconcile, round_down, round_up,
};

use crate::inflight::{InFlight, Role};
use crate::pending::PendingWrite;
use crate::request::PositionsRequest;

/// Where the positions of a [`FetchOutcome`] came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Served entirely from the store.
    Cache,
    /// Fetched from the remote source.
    Remote,
}

impl Origin {
    /// Returns the lowercase name of the origin.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::Remote => "remote",
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of [`EphemerisService::get_positions`].
#[derive(Debug)]
pub struct FetchOutcome {
    /// Positions in ascending time order.
    pub positions: Vec<Position>,
    /// Where the positions came from.
    pub origin: Origin,
    /// Cache write to run once the positions have been delivered.
    ///
    /// Only set for remote results. When several identical requests share
    /// one fetch, the first of them to receive the result gets the write.
    pub pending: Option<PendingWrite>,
}

impl FetchOutcome {
    fn cached(positions: Vec<Position>) -> Self {
        Self {
            positions,
            origin: Origin::Cache,
            pending: None,
        }
    }
}

/// Data obtained from one remote fetch.
#[derive(Debug)]
struct RemoteData {
    new_body: Option<Body>,
    positions: Vec<Position>,
    /// Set once a caller has taken the cache write for this data.
    write_claimed: AtomicBool,
}

impl RemoteData {
    /// Returns true for exactly one caller, and only if there is something to write.
    fn claim_write(&self) -> bool {
        let has_work = self.new_body.is_some() || !self.positions.is_empty();
        has_work && !self.write_claimed.swap(true, Ordering::AcqRel)
    }
}

/// Cache-first ephemeris service over a store and a remote source.
///
/// # Example
///
/// ```rust,ignore
/// use ephem::{EphemerisService, HorizonsSource, PositionsRequest, SqliteStore};
/// use std::{sync::Arc, time::Duration};
///
/// let service = EphemerisService::new(
///     Arc::new(SqliteStore::new("ephem.db")?),
///     Arc::new(HorizonsSource::new(Duration::from_secs(30))?),
/// )
/// .with_fetch_timeout(Duration::from_secs(60));
///
/// let request = PositionsRequest::parse("399", "500@10", "2020-01-01", "2020-01-02", "1d")?;
/// let outcome = service.get_positions(&request).await?;
/// if let Some(write) = outcome.pending {
///     write.spawn();
/// }
/// ```
pub struct EphemerisService {
    store: Arc<dyn EphemerisStore>,
    source: Arc<dyn EphemerisSource>,
    fetch_timeout: Option<Duration>,
    in_flight: InFlight<RemoteData>,
}

impl fmt::Debug for EphemerisService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EphemerisService")
            .field("source", &self.source.name())
            .field("fetch_timeout", &self.fetch_timeout)
            .finish_non_exhaustive()
    }
}

impl EphemerisService {
    /// Create a new service.
    #[must_use]
    pub fn new(store: Arc<dyn EphemerisStore>, source: Arc<dyn EphemerisSource>) -> Self {
        Self {
            store,
            source,
            fetch_timeout: None,
            in_flight: InFlight::default(),
        }
    }

    /// Bound the whole remote phase (fetch plus bounds probe) by `timeout`.
    #[must_use]
    pub const fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = Some(timeout);
        self
    }

    /// Returns the store backing this service.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn EphemerisStore> {
        &self.store
    }

    /// Returns the remote source backing this service.
    #[must_use]
    pub fn source(&self) -> &Arc<dyn EphemerisSource> {
        &self.source
    }

    /// Returns the positions for `request`, from the store when possible.
    ///
    /// The window is widened to interval boundaries (start rounded down, stop
    /// rounded up). For a body already stored it is then narrowed to the
    /// body's ephemeris bounds; a window entirely outside them is an empty
    /// cached result.
    ///
    /// # Errors
    /// Returns store errors from the cache lookup and remote errors from the
    /// fetch. Nothing is written here; see [`FetchOutcome::pending`].
    #[instrument(
        skip(self, request),
        fields(body = %request.body, center = %request.center, step = %request.step)
    )]
    pub async fn get_positions(&self, request: &PositionsRequest) -> Result<FetchOutcome> {
        let interval = request.step.interval();
        let mut start = round_down(request.start, interval);
        let mut stop = round_up(request.stop, interval);

        let body = self.store.get_body(request.body).await?;

        if let Some(body) = &body {
            start = start.max(round_up(body.first_ephemeris_date, interval));
            stop = stop.min(round_down(body.last_ephemeris_date, interval));
            if stop < start {
                debug!(%body, "Window lies outside the ephemeris bounds");
                return Ok(FetchOutcome::cached(Vec::new()));
            }

            let cached = self
                .store
                .get_positions(request.body, &request.center, start, stop)
                .await?;
            let grid = DateGrid::new(start, stop, request.step);
            match reconcile(grid, cached) {
                Reconciliation::Complete(positions) => {
                    info!(count = positions.len(), "Served from cache");
                    return Ok(FetchOutcome::cached(positions));
                }
                Reconciliation::Incomplete { missing } => {
                    debug!(%missing, "Cache incomplete");
                }
            }
        } else {
            debug!("Body not stored; treating as a cache miss");
            if stop < start {
                return Ok(FetchOutcome::cached(Vec::new()));
            }
        }

        self.fetch_remote(request, start, stop, body.is_none()).await
    }

    async fn fetch_remote(
        &self,
        request: &PositionsRequest,
        start: DateTime<Utc>,
        stop: DateTime<Utc>,
        new_body: bool,
    ) -> Result<FetchOutcome> {
        let elements = ElementsRequest {
            body: request.body,
            center: request.center.clone(),
            start,
            stop,
            step: request.step,
        };

        let source = Arc::clone(&self.source);
        let timeout = self.fetch_timeout;
        let key = elements.clone();
        let (role, result) = self
            .in_flight
            .run(key, move || remote_phase(source, elements, new_body, timeout))
            .await;
        let data = result?;

        info!(
            count = data.positions.len(),
            coalesced = role == Role::Follower,
            "Served from remote source"
        );

        // The starter of the fetch may have been cancelled, so the write goes
        // to whichever caller gets here first.
        let pending = data.claim_write().then(|| {
            PendingWrite::new(
                Arc::clone(&self.store),
                data.new_body.clone(),
                data.positions.clone(),
            )
        });

        Ok(FetchOutcome {
            positions: data.positions.clone(),
            origin: Origin::Remote,
            pending,
        })
    }
}

/// Fetches the elements and, for a body seen for the first time, its bounds.
async fn remote_phase(
    source: Arc<dyn EphemerisSource>,
    request: ElementsRequest,
    new_body: bool,
    timeout: Option<Duration>,
) -> Result<RemoteData> {
    let work = async {
        let ephemeris = source.fetch_elements(&request).await?;
        let mut positions = ephemeris.positions;
        positions.sort_by_key(|p| p.time);

        let new_body = if new_body {
            let bounds = source.probe_bounds(request.body).await?;
            Some(
                Body::new(request.body, body_name(ephemeris.target_name, request.body))
                    .with_bounds(bounds.first, bounds.last),
            )
        } else {
            None
        };

        Ok::<_, EphemError>(RemoteData {
            new_body,
            positions,
            write_claimed: AtomicBool::new(false),
        })
    };

    match timeout {
        Some(limit) => tokio::time::timeout(limit, work).await.map_err(|_| {
            EphemError::RemoteFetch(format!(
                "{} did not answer within {limit:?}",
                source.name()
            ))
        })?,
        None => work.await,
    }
}

fn body_name(target_name: Option<String>, id: BodyId) -> String {
    target_name.unwrap_or_else(|| id.to_string())
}

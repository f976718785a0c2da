//! Deferred cache write produced by a remote fetch.

use std::fmt;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{error, info};

use ephem_core::{Body, EphemerisStore, MergeStats, Position, Result, upsert_positions};

/// Cache write scheduled after a remote fetch has been served.
///
/// The serving layer hands the fresh positions to the client first and then
/// either awaits [`PendingWrite::run`] or fires [`PendingWrite::spawn`].
#[must_use = "a pending write does nothing unless run or spawned"]
pub struct PendingWrite {
    store: Arc<dyn EphemerisStore>,
    body: Option<Body>,
    positions: Vec<Position>,
}

impl fmt::Debug for PendingWrite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingWrite")
            .field("body", &self.body)
            .field("positions", &self.positions.len())
            .finish_non_exhaustive()
    }
}

impl PendingWrite {
    pub(crate) fn new(
        store: Arc<dyn EphemerisStore>,
        body: Option<Body>,
        positions: Vec<Position>,
    ) -> Self {
        Self {
            store,
            body,
            positions,
        }
    }

    /// The body to create, if it was seen for the first time.
    #[must_use]
    pub const fn new_body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    /// Number of positions to merge.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Returns true if there are no positions to merge.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Inserts the new body, if any, then upserts every position.
    ///
    /// # Errors
    /// Returns the first store error. Positions merged before it remain stored.
    pub async fn run(self) -> Result<MergeStats> {
        if let Some(body) = &self.body {
            self.store.insert_body(body).await?;
        }
        upsert_positions(self.store.as_ref(), &self.positions).await
    }

    /// Runs the write on a background task, logging the outcome.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let body = self.body.as_ref().map(ToString::to_string);
            match self.run().await {
                Ok(stats) => info!(
                    new_body = body.as_deref(),
                    inserted = stats.inserted,
                    updated = stats.updated,
                    "Cache write complete"
                ),
                Err(e) => error!(error = %e, "Cache write failed"),
            }
        })
    }
}

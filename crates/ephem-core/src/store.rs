//! Store trait for bodies and cached positions.
//!
//! This module defines the [`EphemerisStore`] trait that every storage backend
//! implements. The store enforces uniqueness of the (body, center, time)
//! triple; it reports a conflicting insert instead of failing so the merge
//! step can fall back to an update.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    error::Result,
    types::{Body, BodyId, Center, Position},
};

/// Result of attempting to insert a position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The position was new and has been stored.
    Inserted,
    /// A position with the same (body, center, time) already exists; nothing was written.
    Conflict,
}

/// Trait for persisting bodies and their orbital-element samples.
#[async_trait]
pub trait EphemerisStore: Send + Sync {
    /// Retrieves a body by identifier.
    ///
    /// Returns `Ok(None)` if the body has never been stored.
    async fn get_body(&self, id: BodyId) -> Result<Option<Body>>;

    /// Stores a new body. Storing an identifier that already exists is a no-op.
    async fn insert_body(&self, body: &Body) -> Result<()>;

    /// Retrieves the positions of `body` seen from `center` with
    /// `start <= time <= stop`, sorted ascending by time.
    async fn get_positions(
        &self,
        body: BodyId,
        center: &Center,
        start: DateTime<Utc>,
        stop: DateTime<Utc>,
    ) -> Result<Vec<Position>>;

    /// Inserts a position unless its key is already taken.
    async fn insert_position(&self, position: &Position) -> Result<InsertOutcome>;

    /// Overwrites the orbital elements of the stored position with the same key.
    ///
    /// Returns `false` if no such position exists.
    async fn update_position(&self, position: &Position) -> Result<bool>;

    /// Removes every body and position.
    async fn clear(&self) -> Result<()>;
}

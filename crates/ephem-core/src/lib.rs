#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/ephem/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Core traits and types for the orbital-elements cache.
//!
//! This crate holds everything that does not touch the network or a database:
//!
//! - [`StepSpec`](step::StepSpec) - Parsed request cadence ("6h", "30min")
//! - [`DateGrid`](grid::DateGrid) - Aligned timestamp sequence for a request
//! - [`reconcile`](reconcile::reconcile) - Cache coverage check against a grid
//! - [`upsert_positions`](merge::upsert_positions) - Insert-or-update merge into a store
//! - [`EphemerisStore`](store::EphemerisStore) - Storage abstraction
//! - [`EphemerisSource`](source::EphemerisSource) - Remote ephemeris abstraction

/// Error types for ephemeris operations.
pub mod error;
/// Date grid rounding and generation.
pub mod grid;
/// Interval units used for stepping through time.
pub mod interval;
/// Insert-or-update merging of fetched positions into a store.
pub mod merge;
/// Cache coverage reconciliation.
pub mod reconcile;
/// Remote ephemeris source trait and request types.
pub mod source;
/// Step descriptor parsing.
pub mod step;
/// Store trait for bodies and positions.
pub mod store;
/// Core data types (BodyId, Body, Position, etc.).
pub mod types;

// Re-export commonly used items at crate root
pub use error::{EphemError, Result};
pub use grid::{DateGrid, generate, round_down, round_up};
pub use interval::Interval;
pub use merge::{MergeStats, upsert_positions};
pub use reconcile::{Reconciliation, reconcile};
pub use source::{ElementsRequest, Ephemeris, EphemerisBounds, EphemerisSource};
pub use step::StepSpec;
pub use store::{EphemerisStore, InsertOutcome};
pub use types::{Body, BodyId, Center, OrbitalElements, Position, PositionKey};

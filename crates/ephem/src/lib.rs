#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/ephem/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Cache-first orbital elements service.
//!
//! This crate ties the pieces together: it re-exports the core types, the
//! store implementations and the Horizons source, and provides
//! [`EphemerisService`], which serves position requests from the store and
//! falls back to the remote source when the cache does not cover a request.
//!
//! # Features
//!
//! - `horizons` - JPL Horizons source
//! - `store-sqlite` - SQLite-based store
//!
//! # Example
//!
//! ```rust,ignore
//! use ephem::{EphemerisService, HorizonsSource, InMemoryStore, PositionsRequest};
//! use std::{sync::Arc, time::Duration};
//!
//! #[tokio::main]
//! async fn main() -> ephem::Result<()> {
//!     let service = EphemerisService::new(
//!         Arc::new(InMemoryStore::new()),
//!         Arc::new(HorizonsSource::new(Duration::from_secs(30))?),
//!     );
//!
//!     let request =
//!         PositionsRequest::parse("399", "500@10", "2020-01-01", "2020-01-02", "1d")?;
//!     let outcome = service.get_positions(&request).await?;
//!     println!("{} positions from {}", outcome.positions.len(), outcome.origin);
//!
//!     if let Some(write) = outcome.pending {
//!         write.run().await?;
//!     }
//!
//!     Ok(())
//! }
//! ```

// Core types and traits
pub use ephem_core::*;

// Store implementations
#[cfg(feature = "store-sqlite")]
pub use ephem_store::SqliteStore;
pub use ephem_store::InMemoryStore;

// Sources
#[cfg(feature = "horizons")]
pub use ephem_horizons::{HORIZONS_BASE_URL, HorizonsSource};

mod inflight;
mod pending;
mod request;
mod service;

pub use pending::PendingWrite;
pub use request::{PositionsRequest, parse_timestamp};
pub use service::{EphemerisService, FetchOutcome, Origin};

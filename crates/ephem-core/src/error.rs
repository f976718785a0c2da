//! Error types for ephemeris operations.
//!
//! This module defines [`EphemError`] which covers every failure the cache,
//! the stores and the remote source can report. Client mistakes (bad step,
//! bad timestamp, bad parameter) are kept apart from upstream and storage
//! failures so the serving layer can map them to the right status.

use thiserror::Error;

/// Errors that can occur while serving ephemeris data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EphemError {
    /// The step descriptor could not be parsed (e.g. "d", "0h", "5y").
    #[error("Malformed step: {0}")]
    MalformedStep(String),

    /// A start or stop timestamp could not be parsed, or the range is reversed.
    #[error("Malformed timestamp: {0}")]
    MalformedTimestamp(String),

    /// Any other request parameter was invalid (body id, center).
    #[error("Malformed parameter: {0}")]
    MalformedParameter(String),

    /// The remote service could not be reached, timed out or returned an error status.
    #[error("Remote fetch failed: {0}")]
    RemoteFetch(String),

    /// The remote service answered with a response of unexpected shape.
    #[error("Unexpected remote response: {0}")]
    RemoteFormat(String),

    /// Reading from or writing to the store failed.
    #[error("Store error: {0}")]
    Store(String),
}

impl EphemError {
    /// Returns true if the error was caused by the caller's input.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedStep(_) | Self::MalformedTimestamp(_) | Self::MalformedParameter(_)
        )
    }

    /// Returns true if the error came from the remote ephemeris service.
    #[must_use]
    pub const fn is_remote_error(&self) -> bool {
        matches!(self, Self::RemoteFetch(_) | Self::RemoteFormat(_))
    }
}

/// Result type alias using [`EphemError`].
pub type Result<T> = std::result::Result<T, EphemError>;

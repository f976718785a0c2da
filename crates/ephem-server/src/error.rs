//! Startup and serving errors.

use thiserror::Error;

use ephem::EphemError;

use crate::config::LoadError;

/// Errors that stop the server from starting or running.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration could not be resolved.
    #[error(transparent)]
    Config(#[from] LoadError),

    /// The tracing subscriber could not be installed.
    #[error("telemetry error: {0}")]
    Telemetry(String),

    /// The store or the remote source could not be set up.
    #[error("startup error: {0}")]
    Startup(#[from] EphemError),

    /// Binding or serving the listener failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

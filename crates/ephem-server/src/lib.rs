#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/ephem/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! HTTP server for the orbital elements cache.

pub mod config;
pub mod error;
pub mod http;
pub mod telemetry;

use std::sync::Arc;

use ephem::{
    EphemerisService, EphemerisSource, EphemerisStore, HorizonsSource, InMemoryStore, SqliteStore,
};
use tokio::net::TcpListener;
use tracing::info;

use crate::config::Settings;
use crate::error::ServerError;

/// Build the service described by `settings`.
///
/// # Errors
/// Returns [`ServerError::Startup`] if the store or the HTTP client cannot be created.
pub fn build_service(settings: &Settings) -> Result<EphemerisService, ServerError> {
    let store: Arc<dyn EphemerisStore> = match &settings.store.sqlite_path {
        Some(path) => {
            info!(path = %path.display(), "Using SQLite store");
            Arc::new(SqliteStore::new(path)?)
        }
        None => {
            info!("Using in-memory store");
            Arc::new(InMemoryStore::new())
        }
    };

    let source: Arc<dyn EphemerisSource> = Arc::new(
        HorizonsSource::new(settings.horizons.timeout)?
            .with_base_url(settings.horizons.base_url.clone()),
    );

    Ok(EphemerisService::new(store, source).with_fetch_timeout(settings.fetch.timeout))
}

/// Serve HTTP until interrupted.
///
/// # Errors
/// Returns [`ServerError`] if startup fails or the listener errors.
pub async fn run(settings: Settings) -> Result<(), ServerError> {
    let service = Arc::new(build_service(&settings)?);
    let app = http::router(service);

    let listener = TcpListener::bind(settings.server.addr).await?;
    info!(addr = %settings.server.addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // Without a signal handler the server runs until killed.
        std::future::pending::<()>().await;
    }
}

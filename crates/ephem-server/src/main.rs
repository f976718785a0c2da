//! `ephem-server` binary.

use std::process;

use ephem_server::{config, telemetry};
use tracing::error;

#[tokio::main]
async fn main() {
    let settings = match config::load_with_cli() {
        Ok((_, settings)) => settings,
        Err(err) => {
            eprintln!("failed to load configuration: {err}");
            process::exit(2);
        }
    };

    if let Err(err) = telemetry::init(&settings.logging) {
        eprintln!("{err}");
        process::exit(1);
    }

    if let Err(err) = ephem_server::run(settings).await {
        error!(error = %err, "server error");
        process::exit(1);
    }
}

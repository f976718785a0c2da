//! Configuration layer: typed settings with layered precedence
//! (defaults → file → environment → CLI).

use std::{net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use clap::{Args, Parser, builder::BoolishValueParser};
use config::{Config, ConfigBuilder, Environment, File, builder::DefaultState};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

const DEFAULT_CONFIG_BASENAME: &str = "config/ephem";
const ENV_PREFIX: &str = "EPHEM";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_HORIZONS_TIMEOUT_SECS: u64 = 30;
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 60;

/// Command-line arguments for the server binary.
#[derive(Debug, Parser)]
#[command(
    name = "ephem-server",
    version,
    about = "Caching proxy for JPL Horizons orbital elements"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "EPHEM_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    /// Settings that override file and environment values.
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

/// CLI overrides, applied last.
#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Store data in this SQLite file instead of memory.
    #[arg(long = "sqlite-path", value_name = "PATH")]
    pub sqlite_path: Option<PathBuf>,

    /// Override the Horizons API endpoint.
    #[arg(long = "horizons-base-url", value_name = "URL")]
    pub horizons_base_url: Option<String>,

    /// Override the per-request Horizons HTTP timeout.
    #[arg(long = "horizons-timeout-seconds", value_name = "SECONDS")]
    pub horizons_timeout_seconds: Option<u64>,

    /// Override the limit on the whole remote phase of a request.
    #[arg(long = "fetch-timeout-seconds", value_name = "SECONDS")]
    pub fetch_timeout_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,
}

/// Fully validated server settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Listener settings.
    pub server: ServerSettings,
    /// Store selection.
    pub store: StoreSettings,
    /// Horizons client settings.
    pub horizons: HorizonsSettings,
    /// Remote phase settings.
    pub fetch: FetchSettings,
    /// Logging settings.
    pub logging: LoggingSettings,
}

/// Listener settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Address to bind.
    pub addr: SocketAddr,
}

/// Store selection.
#[derive(Debug, Clone)]
pub struct StoreSettings {
    /// SQLite database file; `None` keeps everything in memory.
    pub sqlite_path: Option<PathBuf>,
}

/// Horizons client settings.
#[derive(Debug, Clone)]
pub struct HorizonsSettings {
    /// API endpoint.
    pub base_url: String,
    /// HTTP timeout for each Horizons request.
    pub timeout: Duration,
}

/// Remote phase settings.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// Limit on the fetch plus bounds probe of one request.
    pub timeout: Duration,
}

/// Logging settings.
#[derive(Debug, Clone)]
pub struct LoggingSettings {
    /// Default level when `RUST_LOG` is unset.
    pub level: LevelFilter,
    /// Output format.
    pub format: LogFormat,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event.
    Json,
    /// Compact human-readable lines.
    Compact,
}

/// Errors raised while resolving settings.
#[derive(Debug, Error)]
pub enum LoadError {
    /// A source could not be read or deserialized.
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    /// A value was present but unusable.
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid {
        /// Dotted settings key.
        key: &'static str,
        /// What was wrong with it.
        reason: String,
    },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
///
/// # Errors
/// Returns [`LoadError`] if a source is unreadable or a value is invalid.
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder =
        Config::builder().add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(environment());

    resolve(builder, &cli.overrides)
}

/// Resolve configuration using the process arguments, returning both for downstream use.
///
/// # Errors
/// Returns [`LoadError`] if a source is unreadable or a value is invalid.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX).separator("__")
}

fn resolve(
    builder: ConfigBuilder<DefaultState>,
    overrides: &ServeOverrides,
) -> Result<Settings, LoadError> {
    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(overrides);
    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    store: RawStoreSettings,
    horizons: RawHorizonsSettings,
    fetch: RawFetchSettings,
    logging: RawLoggingSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawStoreSettings {
    sqlite_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawHorizonsSettings {
    base_url: Option<String>,
    timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawFetchSettings {
    timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(path) = overrides.sqlite_path.as_ref() {
            self.store.sqlite_path = Some(path.clone());
        }
        if let Some(url) = overrides.horizons_base_url.as_ref() {
            self.horizons.base_url = Some(url.clone());
        }
        if let Some(seconds) = overrides.horizons_timeout_seconds {
            self.horizons.timeout_seconds = Some(seconds);
        }
        if let Some(seconds) = overrides.fetch_timeout_seconds {
            self.fetch.timeout_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            store,
            horizons,
            fetch,
            logging,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            store: build_store_settings(store),
            horizons: build_horizons_settings(horizons)?,
            fetch: build_fetch_settings(fetch)?,
            logging: build_logging_settings(logging)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let candidate = format!("{host}:{port}");
    let addr = candidate.parse().map_err(|err| {
        LoadError::invalid("server.host", format!("invalid address `{candidate}`: {err}"))
    })?;

    Ok(ServerSettings { addr })
}

fn build_store_settings(store: RawStoreSettings) -> StoreSettings {
    let sqlite_path = store
        .sqlite_path
        .filter(|path| !path.as_os_str().is_empty());
    StoreSettings { sqlite_path }
}

fn build_horizons_settings(horizons: RawHorizonsSettings) -> Result<HorizonsSettings, LoadError> {
    let base_url = match horizons.base_url {
        Some(url) => {
            let trimmed = url.trim();
            if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
                return Err(LoadError::invalid(
                    "horizons.base_url",
                    format!("`{trimmed}` is not an http(s) URL"),
                ));
            }
            trimmed.to_string()
        }
        None => ephem::HORIZONS_BASE_URL.to_string(),
    };

    let timeout = seconds(
        horizons
            .timeout_seconds
            .unwrap_or(DEFAULT_HORIZONS_TIMEOUT_SECS),
        "horizons.timeout_seconds",
    )?;

    Ok(HorizonsSettings { base_url, timeout })
}

fn build_fetch_settings(fetch: RawFetchSettings) -> Result<FetchSettings, LoadError> {
    let timeout = seconds(
        fetch.timeout_seconds.unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS),
        "fetch.timeout_seconds",
    )?;
    Ok(FetchSettings { timeout })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn seconds(value: u64, key: &'static str) -> Result<Duration, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_secs(value))
}

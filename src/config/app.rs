//! Application settings.
//!
//! Settings come from three layers, later layers winning:
//! 1. built-in defaults,
//! 2. an optional TOML file (`SHOPPING_LIST_CONFIG`, default `./config.toml`),
//! 3. environment variables (`DATABASE_PATH`, `SECRET_KEY`, `BIND_ADDR`, `DISABLE_CSRF`).
//!
//! `.env` is loaded by `main` before this module runs, so values from it count as
//! environment variables.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use tracing::{debug, info, warn};

/// Session-signing secret used when none is configured. Not safe for deployment.
pub const DEV_SECRET_KEY: &str = "your_secret_key";

const DEFAULT_DATABASE_PATH: &str = "database.db";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5000";
const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Resolved application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Path of the `SQLite` database file
    pub database_path: String,
    /// Secret the session cookie is signed with
    pub secret_key: String,
    /// Address the HTTP server listens on
    pub bind_addr: SocketAddr,
    /// Skip CSRF validation (test mode)
    pub disable_csrf: bool,
}

/// Shape of config.toml. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Path of the `SQLite` database file
    pub database_path: Option<String>,
    /// Session-signing secret
    pub secret_key: Option<String>,
    /// Listen address, e.g. `"0.0.0.0:5000"`
    pub bind_addr: Option<String>,
    /// Skip CSRF validation
    pub disable_csrf: Option<bool>,
}

impl AppConfig {
    /// Configuration for tests: the given database file, a fixed secret, and an
    /// optional CSRF bypass.
    #[must_use]
    pub fn for_database(database_path: impl Into<String>, disable_csrf: bool) -> Self {
        Self {
            database_path: database_path.into(),
            secret_key: DEV_SECRET_KEY.to_string(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            disable_csrf,
        }
    }

    /// Whether the session secret is still the insecure development default.
    #[must_use]
    pub fn uses_dev_secret(&self) -> bool {
        self.secret_key == DEV_SECRET_KEY
    }
}

/// Parses a TOML config file.
///
/// # Errors
/// Returns an error if the file cannot be read or is not valid TOML for [`FileConfig`].
pub fn load_file_config<P: AsRef<Path>>(path: P) -> Result<FileConfig> {
    let path_ref = path.as_ref();
    debug!("Attempting to load configuration from: {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {path_ref:?}: {e}"),
    })?;

    toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse TOML from config file {path_ref:?}: {e}"),
    })
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Merges file settings and environment overrides into an [`AppConfig`].
///
/// `lookup` resolves an environment variable name; it is a parameter so the
/// merge can be tested without touching the process environment.
pub fn resolve_config<F>(file: FileConfig, lookup: F) -> Result<AppConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let database_path = lookup("DATABASE_PATH")
        .or(file.database_path)
        .unwrap_or_else(|| DEFAULT_DATABASE_PATH.to_string());

    let secret_key = lookup("SECRET_KEY")
        .filter(|s| !s.is_empty())
        .or(file.secret_key)
        .unwrap_or_else(|| DEV_SECRET_KEY.to_string());

    let bind_raw = lookup("BIND_ADDR")
        .or(file.bind_addr)
        .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
    let bind_addr = bind_raw.parse().map_err(|e| Error::Config {
        message: format!("Invalid bind address {bind_raw:?}: {e}"),
    })?;

    let disable_csrf = lookup("DISABLE_CSRF")
        .map(|v| parse_flag(&v))
        .or(file.disable_csrf)
        .unwrap_or(false);

    Ok(AppConfig {
        database_path,
        secret_key,
        bind_addr,
        disable_csrf,
    })
}

/// Loads the application configuration from config.toml (if present) and the environment.
pub fn load_app_configuration() -> Result<AppConfig> {
    let config_path = std::env::var("SHOPPING_LIST_CONFIG")
        .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    let file = if Path::new(&config_path).exists() {
        info!("Loading configuration file {}", config_path);
        load_file_config(&config_path)?
    } else {
        debug!("No configuration file at {}, using environment only", config_path);
        FileConfig::default()
    };

    let config = resolve_config(file, |name| std::env::var(name).ok())?;

    if config.uses_dev_secret() {
        warn!("SECRET_KEY is not set; session cookies are signed with the development default");
    }
    if config.disable_csrf {
        warn!("CSRF protection is disabled");
    }

    Ok(config)
}

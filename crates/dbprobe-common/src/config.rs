//! Application configuration loaded from environment variables and config files.
//!
//! Supports `.env` files for development and environment variables for production.
//! Config precedence: env vars > .env file > config.toml > defaults
//!
//! Keys are unprefixed so the deployment contract stays `DATABASE_HOST`,
//! `DATABASE_NAME`, `DATABASE_PORT`, `DATABASE_URL` and `ENVIRONMENT`.
//!
//! Numeric settings are kept as text here and parsed when connection
//! parameters are derived, so a bad value fails the connection attempt
//! instead of startup.

use serde::Deserialize;
use std::fmt;

/// Default value for `DATABASE_APPLICATION_NAME`.
pub const DEFAULT_APPLICATION_NAME: &str = "dbprobe";

/// Load the configuration once at startup.
pub fn load() -> Result<AppConfig, config::ConfigError> {
    // Load .env file if present (development)
    let _ = dotenvy::dotenv();

    build(
        config::Config::builder()
            // Optional config file
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::default()),
    )
}

fn build(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
) -> Result<AppConfig, config::ConfigError> {
    let cfg = builder
        .set_default("database_application_name", DEFAULT_APPLICATION_NAME)?
        .set_default("environment", "unknown")?
        .build()?;

    cfg.try_deserialize()
}

#[derive(Deserialize, Clone)]
pub struct AppConfig {
    /// `DATABASE_HOST`. Required before any connection attempt.
    pub database_host: Option<String>,
    /// `DATABASE_NAME`, `postgres` when unset.
    pub database_name: Option<String>,
    /// `DATABASE_PORT`, 5432 when unset.
    pub database_port: Option<String>,
    /// `DATABASE_URL`: the injected JSON secret holding `username` and `password`.
    pub database_url: Option<String>,
    /// `DATABASE_CONNECT_TIMEOUT` in seconds, 10 when unset.
    pub database_connect_timeout: Option<String>,
    /// `DATABASE_APPLICATION_NAME`, reported to PostgreSQL as `application_name`.
    pub database_application_name: String,
    /// `ENVIRONMENT`: free-text tag echoed by the informational endpoints.
    pub environment: String,
}

impl AppConfig {
    /// Build a config from an explicit key/value map instead of the process
    /// environment. Keys use the environment spelling (`DATABASE_HOST`, ...).
    pub fn from_source<I, K, V>(vars: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let source: config::Map<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        build(
            config::Config::builder()
                .add_source(config::Environment::default().source(Some(source))),
        )
    }

    /// Whether a non-empty secret was injected.
    pub fn secret_configured(&self) -> bool {
        self.database_url.as_deref().is_some_and(|s| !s.is_empty())
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("database_host", &self.database_host)
            .field("database_name", &self.database_name)
            .field("database_port", &self.database_port)
            .field("database_url", &self.database_url.as_ref().map(|_| "<redacted>"))
            .field("database_connect_timeout", &self.database_connect_timeout)
            .field("database_application_name", &self.database_application_name)
            .field("environment", &self.environment)
            .finish()
    }
}

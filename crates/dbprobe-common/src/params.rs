//! Connection parameters assembled from configuration and the injected secret.

use std::fmt;
use std::time::Duration;

use crate::config::AppConfig;
use crate::error::ConfigError;
use crate::secret::SecretPayload;

pub const DEFAULT_DATABASE: &str = "postgres";
pub const DEFAULT_PORT: u16 = 5432;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Everything needed to open one PostgreSQL session.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionParameters {
    pub host: String,
    pub database: String,
    pub user: String,
    pub password: String,
    pub port: u16,
    pub connect_timeout_secs: u64,
    /// Sent as the PostgreSQL `application_name`.
    pub application_name: String,
}

impl ConnectionParameters {
    /// Derive parameters from the loaded configuration.
    ///
    /// Host, port and database come from configuration; user and password
    /// come from the secret payload only.
    pub fn derive(config: &AppConfig) -> Result<Self, ConfigError> {
        let raw_secret = config.database_url.as_deref().unwrap_or_default();
        if raw_secret.trim().is_empty() {
            return Err(ConfigError::MissingSecret);
        }

        let host = config
            .database_host
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or(ConfigError::MissingHost)?;

        let secret = SecretPayload::parse(raw_secret)?;
        let port = parse_port(config.database_port.as_deref())?;
        let connect_timeout_secs = parse_timeout(config.database_connect_timeout.as_deref())?;

        let params = Self {
            host: host.to_string(),
            database: config
                .database_name
                .clone()
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
            user: secret.username,
            password: secret.password,
            port,
            connect_timeout_secs,
            application_name: config.database_application_name.clone(),
        };

        tracing::info!(
            host = %params.host,
            database = %params.database,
            port = params.port,
            user = %params.user,
            "Derived database connection parameters"
        );

        Ok(params)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Unset or blank means 5432; anything else must be a port in 1..=65535.
fn parse_port(raw: Option<&str>) -> Result<u16, ConfigError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(DEFAULT_PORT),
        Some(s) => s
            .parse::<u16>()
            .ok()
            .filter(|&port| port != 0)
            .ok_or_else(|| ConfigError::InvalidPort(s.to_string())),
    }
}

/// Unset, blank or `0` means the 10 second default.
fn parse_timeout(raw: Option<&str>) -> Result<u64, ConfigError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(DEFAULT_CONNECT_TIMEOUT_SECS),
        Some(s) => match s.parse::<u64>() {
            Ok(0) => Ok(DEFAULT_CONNECT_TIMEOUT_SECS),
            Ok(secs) => Ok(secs),
            Err(_) => Err(ConfigError::InvalidTimeout(s.to_string())),
        },
    }
}

impl fmt::Debug for ConnectionParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParameters")
            .field("host", &self.host)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("port", &self.port)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("application_name", &self.application_name)
            .finish()
    }
}

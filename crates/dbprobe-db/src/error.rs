//! Database error type.

use dbprobe_common::ConfigError;

/// The underlying driver error, re-exported for callers that match on it.
pub use sqlx::Error as DriverError;

/// Errors raised by the connection manager and its sessions.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Connection timed out after {0}s")]
    ConnectTimeout(u64),

    #[error("Liveness probe returned {0}, expected 1")]
    ProbeMismatch(i64),

    #[error("Connection is closed")]
    Closed,

    /// Query issued while disconnected and the single reconnect attempt failed.
    #[error("Reconnect failed")]
    ReconnectFailed,

    #[error("{0}")]
    Driver(#[from] sqlx::Error),
}

impl DbError {
    /// Whether this error originates from the database layer (transport,
    /// authentication, statement) rather than from local configuration.
    pub fn is_database_error(&self) -> bool {
        !matches!(self, Self::Config(_))
    }
}

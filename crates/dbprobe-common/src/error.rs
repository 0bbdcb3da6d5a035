//! Configuration error type.

/// Missing or malformed configuration. Never transient, never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing host")]
    MissingHost,

    #[error("missing secret")]
    MissingSecret,

    /// The secret is not a JSON object of strings. The message never
    /// contains the secret itself.
    #[error("malformed secret: {0}")]
    MalformedSecret(String),

    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("invalid port: {0:?}")]
    InvalidPort(String),

    #[error("invalid connect timeout: {0:?}")]
    InvalidTimeout(String),
}

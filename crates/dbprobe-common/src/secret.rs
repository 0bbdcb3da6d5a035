//! Credential payload injected into the process as `DATABASE_URL`.
//!
//! The payload carries only `username` and `password`; host, port and
//! database name come from configuration.

use serde_json::{Map, Value};
use std::fmt;

use crate::error::ConfigError;

/// Parsed `{"username": ..., "password": ...}` secret.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretPayload {
    pub username: String,
    pub password: String,
}

impl SecretPayload {
    /// Parse and validate the raw secret string.
    ///
    /// Extra keys are ignored; `username` and `password` must both be present
    /// as non-empty strings.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        if raw.trim().is_empty() {
            return Err(ConfigError::MissingSecret);
        }

        let value: Value =
            serde_json::from_str(raw).map_err(|e| ConfigError::MalformedSecret(e.to_string()))?;

        let Value::Object(fields) = value else {
            return Err(ConfigError::MalformedSecret(
                "expected a JSON object".into(),
            ));
        };

        Ok(Self {
            username: required_str(&fields, "username")?,
            password: required_str(&fields, "password")?,
        })
    }
}

fn required_str(fields: &Map<String, Value>, key: &'static str) -> Result<String, ConfigError> {
    match fields.get(key) {
        None | Some(Value::Null) => Err(ConfigError::MissingField(key)),
        Some(Value::String(s)) if s.is_empty() => Err(ConfigError::MissingField(key)),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(ConfigError::MalformedSecret(format!(
            "'{key}' must be a string"
        ))),
    }
}

impl fmt::Debug for SecretPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretPayload")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

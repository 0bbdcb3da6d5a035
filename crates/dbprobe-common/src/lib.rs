//! # dbprobe-common
//!
//! Configuration, credential parsing and connection parameters shared by the
//! dbprobe crates. No I/O beyond reading the environment at startup.

pub mod config;
pub mod error;
pub mod params;
pub mod secret;

pub use error::ConfigError;
pub use params::ConnectionParameters;
pub use secret::SecretPayload;

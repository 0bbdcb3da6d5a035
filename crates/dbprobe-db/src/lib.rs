//! # dbprobe-db
//!
//! Database layer for dbprobe. Owns exactly one PostgreSQL session through
//! [`ConnectionManager`], which connects lazily, heals the session once per
//! query and closes it on shutdown.

pub mod connector;
pub mod error;
pub mod manager;
pub mod postgres;
pub mod rows;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use connector::{BindValue, Connector, Row, Session};
pub use error::DbError;
pub use manager::ConnectionManager;
pub use postgres::PgConnector;

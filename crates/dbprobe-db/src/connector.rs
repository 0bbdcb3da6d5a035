//! The seam between the connection manager and the database driver.

use async_trait::async_trait;
use dbprobe_common::ConnectionParameters;

use crate::error::DbError;

/// One result row: column values in select-list order.
pub type Row = Vec<serde_json::Value>;

/// A positional bind parameter. Values are always sent separately from the
/// statement text.
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<&str> for BindValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for BindValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<i64> for BindValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for BindValue {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<f64> for BindValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for BindValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl<T: Into<BindValue>> From<Option<T>> for BindValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Opens sessions. Implemented by [`crate::PgConnector`] for PostgreSQL.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a new autocommit session.
    async fn open(&self, params: &ConnectionParameters) -> Result<Box<dyn Session>, DbError>;
}

/// A single live database session.
#[async_trait]
pub trait Session: Send {
    /// Run the liveness probe (`SELECT 1`) and return the value it produced.
    async fn probe(&mut self) -> Result<i64, DbError>;

    /// Execute a statement that returns no rows. Returns rows affected.
    async fn execute(&mut self, sql: &str, binds: &[BindValue]) -> Result<u64, DbError>;

    /// Execute a query and return every row.
    async fn fetch_all(&mut self, sql: &str, binds: &[BindValue]) -> Result<Vec<Row>, DbError>;

    /// Whether the session is known to be unusable without a round-trip.
    fn is_closed(&self) -> bool;

    /// Terminate the session.
    async fn close(&mut self) -> Result<(), DbError>;
}

//! In-memory scripted connector for tests.
//!
//! Sessions behave like a tiny single-table database: `INSERT` appends a row
//! built from the bind values, `DROP` empties the table and any `SELECT`
//! other than the probe returns the stored rows. Failures are toggled on the
//! shared script and every call is counted.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dbprobe_common::ConnectionParameters;

use crate::connector::{BindValue, Connector, Row, Session};
use crate::error::DbError;

struct Script {
    reachable: AtomicBool,
    probe_value: AtomicI64,
    probe_fails: AtomicBool,
    statements_fail: AtomicBool,
    /// Bumped by `sever()`; sessions from an older epoch report closed.
    epoch: AtomicU64,
    connect_attempts: AtomicUsize,
    opens: AtomicUsize,
    probes: AtomicUsize,
    closes: AtomicUsize,
    statements: Mutex<Vec<(String, Vec<BindValue>)>>,
    table: Mutex<Vec<Row>>,
}

/// A [`Connector`] whose behaviour is driven by the test.
#[derive(Clone)]
pub struct ScriptedConnector {
    script: Arc<Script>,
}

impl Default for ScriptedConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self {
            script: Arc::new(Script {
                reachable: AtomicBool::new(true),
                probe_value: AtomicI64::new(1),
                probe_fails: AtomicBool::new(false),
                statements_fail: AtomicBool::new(false),
                epoch: AtomicU64::new(0),
                connect_attempts: AtomicUsize::new(0),
                opens: AtomicUsize::new(0),
                probes: AtomicUsize::new(0),
                closes: AtomicUsize::new(0),
                statements: Mutex::new(Vec::new()),
                table: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.script.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn set_probe_value(&self, value: i64) {
        self.script.probe_value.store(value, Ordering::SeqCst);
    }

    pub fn set_probe_fails(&self, fails: bool) {
        self.script.probe_fails.store(fails, Ordering::SeqCst);
    }

    pub fn set_statements_fail(&self, fails: bool) {
        self.script.statements_fail.store(fails, Ordering::SeqCst);
    }

    /// Mark every open session as closed, as if the server went away.
    pub fn sever(&self) {
        self.script.epoch.fetch_add(1, Ordering::SeqCst);
    }

    /// Calls to `open`, successful or not.
    pub fn connect_attempts(&self) -> usize {
        self.script.connect_attempts.load(Ordering::SeqCst)
    }

    /// Sessions successfully opened.
    pub fn opens(&self) -> usize {
        self.script.opens.load(Ordering::SeqCst)
    }

    pub fn probes(&self) -> usize {
        self.script.probes.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.script.closes.load(Ordering::SeqCst)
    }

    /// Statements sent so far, excluding probes.
    pub fn statements(&self) -> Vec<(String, Vec<BindValue>)> {
        self.script.statements.lock().expect("script lock poisoned").clone()
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn open(&self, _params: &ConnectionParameters) -> Result<Box<dyn Session>, DbError> {
        self.script.connect_attempts.fetch_add(1, Ordering::SeqCst);
        if !self.script.reachable.load(Ordering::SeqCst) {
            return Err(DbError::Driver(sqlx::Error::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            ))));
        }
        self.script.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedSession {
            script: self.script.clone(),
            epoch: self.script.epoch.load(Ordering::SeqCst),
            closed: false,
        }))
    }
}

struct ScriptedSession {
    script: Arc<Script>,
    epoch: u64,
    closed: bool,
}

impl ScriptedSession {
    fn record(&self, sql: &str, binds: &[BindValue]) -> Result<(), DbError> {
        self.script
            .statements
            .lock()
            .expect("script lock poisoned")
            .push((sql.to_string(), binds.to_vec()));

        if self.is_closed() {
            return Err(DbError::Closed);
        }
        if self.script.statements_fail.load(Ordering::SeqCst) {
            return Err(DbError::Driver(sqlx::Error::Protocol(
                "relation does not exist".into(),
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Session for ScriptedSession {
    async fn probe(&mut self) -> Result<i64, DbError> {
        self.script.probes.fetch_add(1, Ordering::SeqCst);
        if self.is_closed() || self.script.probe_fails.load(Ordering::SeqCst) {
            return Err(DbError::Driver(sqlx::Error::Protocol(
                "server closed the connection unexpectedly".into(),
            )));
        }
        Ok(self.script.probe_value.load(Ordering::SeqCst))
    }

    async fn execute(&mut self, sql: &str, binds: &[BindValue]) -> Result<u64, DbError> {
        self.record(sql, binds)?;

        let mut table = self.script.table.lock().expect("script lock poisoned");
        let verb = sql.trim_start().to_ascii_uppercase();
        if verb.starts_with("INSERT") {
            let id = table.len() as i64 + 1;
            let mut row = vec![serde_json::Value::from(id)];
            row.extend(binds.iter().map(|b| match b {
                BindValue::Null => serde_json::Value::Null,
                BindValue::Bool(v) => serde_json::Value::from(*v),
                BindValue::Int(v) => serde_json::Value::from(*v),
                BindValue::Float(v) => serde_json::Value::from(*v),
                BindValue::Text(v) => serde_json::Value::from(v.as_str()),
            }));
            table.push(row);
            Ok(1)
        } else if verb.starts_with("DROP") {
            table.clear();
            Ok(0)
        } else {
            Ok(0)
        }
    }

    async fn fetch_all(&mut self, sql: &str, binds: &[BindValue]) -> Result<Vec<Row>, DbError> {
        self.record(sql, binds)?;

        if sql.trim() == "SELECT 1" {
            return Ok(vec![vec![serde_json::Value::from(1)]]);
        }
        Ok(self.script.table.lock().expect("script lock poisoned").clone())
    }

    fn is_closed(&self) -> bool {
        self.closed || self.epoch != self.script.epoch.load(Ordering::SeqCst)
    }

    async fn close(&mut self) -> Result<(), DbError> {
        self.script.closes.fetch_add(1, Ordering::SeqCst);
        self.closed = true;
        Ok(())
    }
}

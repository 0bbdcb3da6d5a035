//! Lifecycle of the single database connection.
//!
//! [`ConnectionManager`] owns zero or one live [`Session`]. It connects
//! lazily, answers health checks with a `SELECT 1` round-trip and gives every
//! query exactly one chance to reconnect. All operations hold one async lock
//! for their whole duration, so statements are serialized through the session
//! and two callers never race to replace it.

use std::sync::Arc;

use dbprobe_common::config::AppConfig;
use dbprobe_common::{ConfigError, ConnectionParameters};
use tokio::sync::Mutex;

use crate::connector::{BindValue, Connector, Row, Session};
use crate::error::DbError;
use crate::postgres::PgConnector;

/// Value the liveness probe must return.
pub const PROBE_SENTINEL: i64 = 1;

#[derive(Default)]
struct State {
    session: Option<Box<dyn Session>>,
    /// Diagnostic from the most recent failed `connect()`.
    last_error: Option<String>,
}

/// Owns the process's one database connection.
pub struct ConnectionManager {
    config: AppConfig,
    connector: Arc<dyn Connector>,
    state: Mutex<State>,
}

impl ConnectionManager {
    /// Manager backed by real PostgreSQL connections.
    pub fn new(config: AppConfig) -> Self {
        Self::with_connector(config, Arc::new(PgConnector))
    }

    pub fn with_connector(config: AppConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            config,
            connector,
            state: Mutex::new(State::default()),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Assemble connection parameters from configuration and the secret.
    pub fn derive_parameters(&self) -> Result<ConnectionParameters, ConfigError> {
        ConnectionParameters::derive(&self.config).inspect_err(|e| {
            tracing::error!(error = %e, "Failed to get connection parameters");
        })
    }

    /// Ensure a healthy connection exists.
    ///
    /// Returns `true` without reconnecting when the current session answers
    /// the probe. Otherwise opens a fresh session; any failure is reduced to
    /// `false` and recorded in [`last_error`](Self::last_error).
    pub async fn connect(&self) -> bool {
        self.try_connect().await.is_ok()
    }

    /// Same as [`connect`](Self::connect), but hands back the diagnostic of
    /// this attempt instead of leaving callers to read it under a second lock.
    pub async fn try_connect(&self) -> Result<(), String> {
        let mut state = self.state.lock().await;
        self.connect_locked(&mut state).await
    }

    /// Probe the current session, if any.
    ///
    /// A failed probe leaves the session in place; only `connect()` replaces it.
    pub async fn is_connected(&self) -> bool {
        let mut state = self.state.lock().await;
        probe(&mut state).await
    }

    /// Run one statement, reconnecting once if the session is unhealthy.
    ///
    /// `SELECT` statements return every row; anything else returns `None`.
    pub async fn execute_query(
        &self,
        sql: &str,
        binds: &[BindValue],
    ) -> Result<Option<Vec<Row>>, DbError> {
        let mut state = self.state.lock().await;

        if !probe(&mut state).await {
            tracing::info!("Connection lost, attempting to reconnect...");
            if self.connect_locked(&mut state).await.is_err() {
                return Err(DbError::ReconnectFailed);
            }
        }

        let session = state.session.as_mut().ok_or(DbError::Closed)?;

        let result = if is_select(sql) {
            session.fetch_all(sql, binds).await.map(Some)
        } else {
            session.execute(sql, binds).await.map(|_| None)
        };

        result.inspect_err(|e| tracing::error!(error = %e, "Query execution failed"))
    }

    /// Close the session if one is open. Safe to call repeatedly.
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        let Some(mut session) = state.session.take() else {
            return;
        };
        if session.is_closed() {
            return;
        }
        match session.close().await {
            Ok(()) => tracing::info!("Database connection closed"),
            Err(e) => tracing::warn!(error = %e, "Error while closing database connection"),
        }
    }

    /// Diagnostic recorded by the most recent failed `connect()`, cleared on success.
    pub async fn last_error(&self) -> Option<String> {
        self.state.lock().await.last_error.clone()
    }

    async fn connect_locked(&self, state: &mut State) -> Result<(), String> {
        if probe(state).await {
            tracing::debug!("Database connection already exists and is healthy");
            return Ok(());
        }

        // Stale or absent; a new session replaces it.
        state.session = None;

        tracing::info!("Establishing database connection...");
        match self.open_session().await {
            Ok(session) => {
                state.session = Some(session);
                state.last_error = None;
                tracing::info!("Database connection successful");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "Database connection failed");
                let diagnostic = e.to_string();
                state.last_error = Some(diagnostic.clone());
                Err(diagnostic)
            }
        }
    }

    async fn open_session(&self) -> Result<Box<dyn Session>, DbError> {
        let params = self.derive_parameters()?;
        let mut session = self.connector.open(&params).await?;

        let value = session.probe().await?;
        if value != PROBE_SENTINEL {
            return Err(DbError::ProbeMismatch(value));
        }

        Ok(session)
    }
}

async fn probe(state: &mut State) -> bool {
    let Some(session) = state.session.as_mut() else {
        return false;
    };
    if session.is_closed() {
        return false;
    }

    match session.probe().await {
        Ok(PROBE_SENTINEL) => true,
        Ok(other) => {
            tracing::warn!(value = other, "Connection check returned unexpected value");
            false
        }
        Err(e) => {
            tracing::warn!(error = %e, "Connection check failed");
            false
        }
    }
}

/// Whether a statement produces a result set to hand back.
fn is_select(sql: &str) -> bool {
    sql.trim_start()
        .get(..6)
        .is_some_and(|head| head.eq_ignore_ascii_case("select"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedConnector;

    fn config() -> AppConfig {
        AppConfig::from_source([
            ("DATABASE_HOST", "db.example"),
            ("DATABASE_URL", r#"{"username":"u","password":"p"}"#),
        ])
        .unwrap()
    }

    fn manager() -> (ConnectionManager, ScriptedConnector) {
        let connector = ScriptedConnector::new();
        let manager = ConnectionManager::with_connector(config(), Arc::new(connector.clone()));
        (manager, connector)
    }

    #[test]
    fn select_detection() {
        assert!(is_select("SELECT 1"));
        assert!(is_select("  \n select * from t"));
        assert!(is_select("Select now()"));
        assert!(!is_select("INSERT INTO t VALUES (1)"));
        assert!(!is_select("WITH x AS (SELECT 1) SELECT * FROM x"));
        assert!(!is_select("sel"));
        assert!(!is_select(""));
    }

    #[tokio::test]
    async fn connect_twice_reuses_session() {
        let (manager, db) = manager();

        assert!(manager.connect().await);
        assert!(manager.connect().await);

        assert_eq!(db.opens(), 1);
        assert!(db.probes() <= 2);
        assert!(manager.is_connected().await);
    }

    #[tokio::test]
    async fn connect_fails_on_unreachable_database() {
        let (manager, db) = manager();
        db.set_reachable(false);

        assert!(!manager.connect().await);
        assert!(!manager.is_connected().await);
        assert!(manager.last_error().await.is_some());
    }

    #[tokio::test]
    async fn connect_rejects_wrong_sentinel() {
        let (manager, db) = manager();
        db.set_probe_value(2);

        assert!(!manager.connect().await);
        assert!(manager.last_error().await.unwrap().contains("expected 1"));
        assert!(!manager.is_connected().await);
    }

    #[tokio::test]
    async fn connect_reports_config_error_as_false() {
        let connector = ScriptedConnector::new();
        let cfg = AppConfig::from_source([("DATABASE_URL", r#"{"username":"u","password":"p"}"#)])
            .unwrap();
        let manager = ConnectionManager::with_connector(cfg, Arc::new(connector.clone()));

        assert!(!manager.connect().await);
        assert_eq!(connector.opens(), 0);
        assert!(manager.last_error().await.unwrap().contains("missing host"));
    }

    #[tokio::test]
    async fn try_connect_returns_its_own_diagnostic() {
        let (manager, db) = manager();
        db.set_probe_value(2);

        let failing = manager.try_connect().await.unwrap_err();
        assert!(failing.contains("expected 1"));

        // A later success clears the shared diagnostic but not the one
        // already handed out.
        db.set_probe_value(1);
        assert_eq!(manager.try_connect().await, Ok(()));
        assert_eq!(manager.last_error().await, None);
        assert!(failing.contains("returned 2"));

        db.set_reachable(false);
        db.sever();
        let refused = manager.try_connect().await.unwrap_err();
        assert!(refused.contains("refused"));
        assert_eq!(manager.last_error().await.as_deref(), Some(refused.as_str()));
    }

    #[tokio::test]
    async fn success_clears_last_error() {
        let (manager, db) = manager();
        db.set_reachable(false);
        assert!(!manager.connect().await);

        db.set_reachable(true);
        assert!(manager.connect().await);
        assert_eq!(manager.last_error().await, None);
    }

    #[tokio::test]
    async fn connect_replaces_dead_session() {
        let (manager, db) = manager();
        assert!(manager.connect().await);

        db.sever();
        assert!(!manager.is_connected().await);
        assert!(manager.connect().await);
        assert_eq!(db.opens(), 2);
    }

    #[tokio::test]
    async fn failed_probe_does_not_clear_session() {
        let (manager, db) = manager();
        assert!(manager.connect().await);

        db.set_probe_fails(true);
        assert!(!manager.is_connected().await);
        let probes = db.probes();
        assert!(!manager.is_connected().await);
        // The session is still held, so it is probed again.
        assert_eq!(db.probes(), probes + 1);
    }

    #[tokio::test]
    async fn select_returns_rows_and_other_statements_none() {
        let (manager, _db) = manager();
        assert!(manager.connect().await);

        let created = manager
            .execute_query("CREATE TABLE IF NOT EXISTS t (id SERIAL, name TEXT)", &[])
            .await
            .unwrap();
        assert!(created.is_none());

        for name in ["a", "b", "c"] {
            let inserted = manager
                .execute_query("INSERT INTO t (name) VALUES ($1)", &[name.into()])
                .await
                .unwrap();
            assert!(inserted.is_none());
        }

        let rows = manager
            .execute_query("select * from t", &[])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rows.len(), 3);
    }

    #[tokio::test]
    async fn binds_are_passed_separately() {
        let (manager, db) = manager();
        let hostile = "x'); DROP TABLE t; --";
        manager
            .execute_query("INSERT INTO t (name) VALUES ($1)", &[hostile.into()])
            .await
            .unwrap();

        let (sql, binds) = db.statements().pop().unwrap();
        assert_eq!(sql, "INSERT INTO t (name) VALUES ($1)");
        assert_eq!(binds, vec![BindValue::Text(hostile.into())]);
    }

    #[tokio::test]
    async fn query_while_disconnected_reconnects_once() {
        let (manager, db) = manager();

        let result = manager.execute_query("SELECT 1", &[]).await.unwrap();
        assert!(result.is_some());
        assert_eq!(db.opens(), 1);
    }

    #[tokio::test]
    async fn failed_reconnect_sends_no_statement() {
        let (manager, db) = manager();
        db.set_reachable(false);

        let err = manager.execute_query("SELECT 1", &[]).await.unwrap_err();
        assert!(matches!(err, DbError::ReconnectFailed));
        assert_eq!(db.connect_attempts(), 1);
        assert!(db.statements().is_empty());
    }

    #[tokio::test]
    async fn driver_error_propagates_without_retry() {
        let (manager, db) = manager();
        assert!(manager.connect().await);
        db.set_statements_fail(true);

        let err = manager
            .execute_query("INSERT INTO t (name) VALUES ($1)", &["a".into()])
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Driver(_)));
        assert!(err.is_database_error());
        assert_eq!(db.statements().len(), 1);
        assert_eq!(db.opens(), 1);
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let (manager, db) = manager();
        manager.close().await;
        assert_eq!(db.closes(), 0);

        assert!(manager.connect().await);
        manager.close().await;
        manager.close().await;
        assert_eq!(db.closes(), 1);
        assert!(!manager.is_connected().await);
    }

    #[tokio::test]
    async fn concurrent_queries_share_one_session() {
        let (manager, db) = manager();
        let manager = Arc::new(manager);

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let manager = manager.clone();
                tokio::spawn(async move { manager.execute_query("SELECT 1", &[]).await })
            })
            .collect();
        for task in tasks {
            assert!(task.await.unwrap().is_ok());
        }

        assert_eq!(db.opens(), 1);
    }
}

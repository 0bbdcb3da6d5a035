//! Read/write check against a scratch table: create, insert, select, drop.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;

use crate::error::{ApiError, ApiResult};
use crate::{timestamp, AppState, SERVICE_NAME};

const CREATE_SCRATCH: &str = "CREATE TABLE IF NOT EXISTS dbprobe_scratch (
    id SERIAL PRIMARY KEY,
    name VARCHAR(100),
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
)";
const INSERT_SCRATCH: &str = "INSERT INTO dbprobe_scratch (name) VALUES ($1)";
const SELECT_SCRATCH: &str = "SELECT * FROM dbprobe_scratch ORDER BY id DESC LIMIT 5";
const DROP_SCRATCH: &str = "DROP TABLE IF EXISTS dbprobe_scratch";

const SCRATCH_RECORD: &str = "dbprobe test record";

#[derive(Serialize)]
struct DbTestResponse {
    status: &'static str,
    database_connected: bool,
    test_results: Vec<String>,
    message: &'static str,
    timestamp: String,
    service: &'static str,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/db-test", get(database_test))
}

/// GET /db-test — four sequential statements; any failure aborts the run.
async fn database_test(State(state): State<Arc<AppState>>) -> ApiResult<Json<DbTestResponse>> {
    if let Err(diagnostic) = state.db.try_connect().await {
        return Err(ApiError::ConnectionUnavailable {
            diagnostic: Some(diagnostic),
        });
    }

    let mut results = Vec::with_capacity(4);

    tracing::info!("DB test: creating scratch table");
    state.db.execute_query(CREATE_SCRATCH, &[]).await?;
    results.push("Table created successfully".to_string());

    tracing::info!("DB test: inserting test data");
    state
        .db
        .execute_query(INSERT_SCRATCH, &[SCRATCH_RECORD.into()])
        .await?;
    results.push("Data inserted successfully".to_string());

    tracing::info!("DB test: selecting test data");
    let rows = state
        .db
        .execute_query(SELECT_SCRATCH, &[])
        .await?
        .unwrap_or_default();
    results.push(format!(
        "Data selected successfully: {} rows retrieved",
        rows.len()
    ));

    tracing::info!("DB test: dropping scratch table");
    state.db.execute_query(DROP_SCRATCH, &[]).await?;
    results.push("Table dropped successfully".to_string());

    tracing::info!("DB test: all database operations completed successfully");

    Ok(Json(DbTestResponse {
        status: "success",
        database_connected: true,
        test_results: results,
        message: "All database operations completed successfully",
        timestamp: timestamp(),
        service: SERVICE_NAME,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{app, app_with, get};
    use axum::http::StatusCode;
    use dbprobe_db::BindValue;

    #[tokio::test]
    async fn runs_all_four_steps() {
        let (app, db) = app();
        let (status, body) = get(app, "/db-test").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["database_connected"], true);
        let results = body["test_results"].as_array().unwrap();
        assert_eq!(results.len(), 4);
        assert_eq!(results[2], "Data selected successfully: 1 rows retrieved");
        assert_eq!(results[3], "Table dropped successfully");

        let statements = db.statements();
        assert_eq!(statements.len(), 4);
        assert_eq!(statements[1].0, INSERT_SCRATCH);
        assert_eq!(statements[1].1, vec![BindValue::Text(SCRATCH_RECORD.into())]);
        assert_eq!(statements[3].0, DROP_SCRATCH);
    }

    #[tokio::test]
    async fn unreachable_database_is_503() {
        let (app, db) = app();
        db.set_reachable(false);
        let (status, body) = get(app, "/db-test").await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["detail"]["database_connected"], false);
        assert!(body["detail"]["message"].as_str().unwrap().contains("refused"));
        assert!(db.statements().is_empty());
    }

    #[tokio::test]
    async fn statement_failure_is_503() {
        let (app, db) = app();
        db.set_statements_fail(true);
        let (status, body) = get(app, "/db-test").await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["detail"]["type"], "PostgreSQL Error");
        assert_eq!(body["detail"]["database_connected"], false);
        // Aborted after the first statement.
        assert_eq!(db.statements().len(), 1);
    }

    #[tokio::test]
    async fn missing_credentials_is_503_without_connecting() {
        let (app, db) = app_with(&[("DATABASE_HOST", "db.example")]);
        let (status, body) = get(app, "/db-test").await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["detail"]["message"].as_str().unwrap().contains("missing secret"));
        assert_eq!(db.connect_attempts(), 0);
    }
}

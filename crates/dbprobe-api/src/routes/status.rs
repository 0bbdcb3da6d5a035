//! Connectivity status: attempts a connection and reports the outcome.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;

use crate::{timestamp, AppState, SERVICE_NAME};

#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
    database_connected: bool,
    database_error: Option<String>,
    timestamp: String,
    service: &'static str,
    environment: String,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/status", get(status_check))
}

/// GET /status — always 200; connectivity is reported in the body.
async fn status_check(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let database_error = match state.db.try_connect().await {
        Ok(()) => {
            tracing::info!("Status check: database connection successful");
            None
        }
        Err(diagnostic) => {
            tracing::warn!("Status check: database connection failed");
            Some(diagnostic)
        }
    };
    let database_connected = database_error.is_none();

    Json(StatusResponse {
        status: "running",
        database_connected,
        database_error,
        timestamp: timestamp(),
        service: SERVICE_NAME,
        environment: state.config.environment.clone(),
    })
}

//! Read-only reflections of the loaded configuration. The secret is only
//! ever reported as present or absent.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;

use crate::{timestamp, AppState, SERVICE_NAME};

#[derive(Serialize)]
struct ConfigResponse {
    database_host: String,
    database_name: String,
    database_port: String,
    secret_configured: bool,
    environment: String,
    service: &'static str,
}

#[derive(Serialize)]
struct EnvironmentVars {
    #[serde(rename = "DATABASE_HOST")]
    database_host: String,
    #[serde(rename = "DATABASE_NAME")]
    database_name: String,
    #[serde(rename = "DATABASE_PORT")]
    database_port: String,
    #[serde(rename = "DATABASE_URL_SET")]
    database_url_set: &'static str,
}

#[derive(Serialize)]
struct EnvironmentResponse {
    environment_vars: EnvironmentVars,
    service: &'static str,
    timestamp: String,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/config", get(config_info))
        .route("/environment", get(environment_info))
}

fn or_placeholder<T: ToString>(value: Option<&T>, placeholder: &str) -> String {
    value.map_or_else(|| placeholder.to_string(), ToString::to_string)
}

/// GET /config — non-sensitive configuration.
async fn config_info(State(state): State<Arc<AppState>>) -> Json<ConfigResponse> {
    let cfg = &state.config;
    Json(ConfigResponse {
        database_host: or_placeholder(cfg.database_host.as_ref(), "not-configured"),
        database_name: or_placeholder(cfg.database_name.as_ref(), "not-configured"),
        database_port: or_placeholder(cfg.database_port.as_ref(), "not-configured"),
        secret_configured: cfg.secret_configured(),
        environment: cfg.environment.clone(),
        service: SERVICE_NAME,
    })
}

/// GET /environment — which deployment variables are set.
async fn environment_info(State(state): State<Arc<AppState>>) -> Json<EnvironmentResponse> {
    let cfg = &state.config;
    Json(EnvironmentResponse {
        environment_vars: EnvironmentVars {
            database_host: or_placeholder(cfg.database_host.as_ref(), "not-set"),
            database_name: or_placeholder(cfg.database_name.as_ref(), "not-set"),
            database_port: or_placeholder(cfg.database_port.as_ref(), "not-set"),
            database_url_set: if cfg.secret_configured() { "Yes" } else { "No" },
        },
        service: SERVICE_NAME,
        timestamp: timestamp(),
    })
}

#[cfg(test)]
mod tests {
    use crate::test_support::{app, app_with, get, SECRET};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn config_never_echoes_secret() {
        let (app, db) = app();
        let (status, body) = get(app, "/config").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["database_host"], "db.example");
        assert_eq!(body["database_name"], "not-configured");
        assert_eq!(body["database_port"], "not-configured");
        assert_eq!(body["secret_configured"], true);
        assert_eq!(body["environment"], "staging");
        assert!(!body.to_string().contains(SECRET));
        assert_eq!(db.connect_attempts(), 0);
    }

    #[tokio::test]
    async fn environment_lists_variables() {
        let (app, _db) = app_with(&[("DATABASE_PORT", "6543")]);
        let (status, body) = get(app, "/environment").await;

        assert_eq!(status, StatusCode::OK);
        let vars = &body["environment_vars"];
        assert_eq!(vars["DATABASE_HOST"], "not-set");
        assert_eq!(vars["DATABASE_PORT"], "6543");
        assert_eq!(vars["DATABASE_URL_SET"], "No");
    }
}

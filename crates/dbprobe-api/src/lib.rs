//! # dbprobe-api
//!
//! HTTP layer for dbprobe. Handlers are thin: they call into the
//! [`ConnectionManager`] and serialize whatever it returns.

pub mod error;
pub mod routes;

use axum::Router;
use dbprobe_common::config::AppConfig;
use dbprobe_db::ConnectionManager;
use std::sync::Arc;

/// Name reported in every response body.
pub const SERVICE_NAME: &str = "dbprobe";

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    /// The process's single database connection.
    pub db: Arc<ConnectionManager>,
    /// Configuration as loaded at startup, for the informational endpoints.
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(db: Arc<ConnectionManager>) -> Self {
        let config = Arc::new(db.config().clone());
        Self { db, config }
    }
}

/// Build the complete router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::health::router())
        .merge(routes::status::router())
        .merge(routes::db_test::router())
        .merge(routes::info::router())
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// Current time for response bodies.
pub(crate) fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use dbprobe_db::testing::ScriptedConnector;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    pub const SECRET: &str = r#"{"username":"u","password":"p"}"#;

    pub fn app_with(vars: &[(&str, &str)]) -> (Router, ScriptedConnector) {
        let config = AppConfig::from_source(vars.iter().copied()).unwrap();
        let connector = ScriptedConnector::new();
        let manager = ConnectionManager::with_connector(config, Arc::new(connector.clone()));
        (build_router(AppState::new(Arc::new(manager))), connector)
    }

    pub fn app() -> (Router, ScriptedConnector) {
        app_with(&[
            ("DATABASE_HOST", "db.example"),
            ("DATABASE_URL", SECRET),
            ("ENVIRONMENT", "staging"),
        ])
    }

    pub async fn get(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }
}

//! # dbprobe
//!
//! Binary that wires configuration, the database connection manager and the
//! HTTP API together. The process starts even when the database is down; the
//! first request that needs it reconnects lazily.

use clap::Parser;
use dbprobe_api::{build_router, AppState};
use dbprobe_db::ConnectionManager;
use std::net::SocketAddr;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "dbprobe", version, about = "PostgreSQL connectivity probe service")]
struct Args {
    /// Address to bind the HTTP server to.
    #[arg(long, env = "SERVER_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to bind the HTTP server to.
    #[arg(long, env = "SERVER_PORT", default_value_t = 8000)]
    port: u16,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = dbprobe_common::config::load()?;

    // Initialize tracing (structured logging)
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "dbprobe=debug,tower_http=debug".into());
    if args.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    }

    tracing::info!("🚀 Starting dbprobe v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(environment = %config.environment, "Configuration loaded");

    let db = Arc::new(ConnectionManager::new(config));

    // A failed first attempt is not fatal; requests reconnect on demand.
    tracing::info!("Attempting database connection...");
    if db.connect().await {
        tracing::info!("✅ Database connection established during startup");
    } else {
        tracing::warn!("⚠️  Database connection failed during startup, will retry on first request");
    }

    let router = build_router(AppState::new(db.clone()));
    let addr = SocketAddr::new(args.host.parse()?, args.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("📡 HTTP API listening on http://{addr}");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down...");
    db.close().await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }
}

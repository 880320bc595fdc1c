//! Transync API Server implementation
//!
//! HTTP REST API server using Axum. One [`Workspace`] is shared by all
//! requests; work on it runs on the blocking pool.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::Settings;
use crate::workspace::Workspace;

use super::handlers;

/// API Server configuration
#[derive(Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    /// Workspace configuration file
    pub config: PathBuf,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            config: PathBuf::from("transync.yaml"),
        }
    }
}

/// Shared application state
pub struct AppState {
    pub version: String,
    pub workspace: Mutex<Workspace>,
}

impl AppState {
    pub fn new(workspace: Workspace) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            workspace: Mutex::new(workspace),
        }
    }
}

/// Install the `RUST_LOG`-driven subscriber. Later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "transync=info,tower_http=info".into()),
        )
        .try_init();
}

pub fn build_router(state: Arc<AppState>) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health and info endpoints
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/version", get(handlers::version))
        // Translations
        .route("/api/v1/translations", get(handlers::translations))
        .route(
            "/api/v1/download/:project/:component/:lang",
            get(handlers::download_translation),
        )
        .route(
            "/api/v1/download/:project/:component",
            get(handlers::download_component),
        )
        .route(
            "/api/v1/upload/:project/:component/:lang",
            post(handlers::upload),
        )
        .route("/api/v1/sync/:project/:component", post(handlers::sync))
        .route(
            "/api/v1/commit/:project/:component/:lang",
            post(handlers::commit),
        )
        .route(
            "/api/v1/lock/:project/:component/:lang",
            post(handlers::lock),
        )
        // State and middleware
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Run the API server
pub async fn run_api_server(config: ApiConfig) -> anyhow::Result<()> {
    init_tracing();

    let settings = Settings::load(&config.config)?;
    let mut workspace = Workspace::open(&settings)?;
    let reports = workspace.sync_all(false)?;
    for report in reports.iter().filter(|r| r.error.is_some()) {
        warn!(
            "{}: {}",
            report.translation,
            report.error.as_deref().unwrap_or_default()
        );
    }
    info!(
        "Loaded {} translations from {}",
        reports.len(),
        config.config.display()
    );

    let app = build_router(Arc::new(AppState::new(workspace)));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Transync API Server starting on http://{}", addr);
    info!("   Endpoints: /api/v1/translations, /api/v1/download, /api/v1/upload, /api/v1/sync, /api/v1/commit, /api/v1/lock");
    info!("   Health: /health, Version: /version");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Transync API Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to install Ctrl+C handler: {}", e);
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
                warn!("failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, stopping server...");
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== ApiConfig Tests ====================

    #[test]
    fn test_default_config() {
        let config = ApiConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.config, PathBuf::from("transync.yaml"));
    }

    #[test]
    fn test_config_address_format() {
        let config = ApiConfig {
            host: "192.168.1.100".to_string(),
            port: 9090,
            ..Default::default()
        };
        let addr_str = format!("{}:{}", config.host, config.port);
        assert_eq!(addr_str, "192.168.1.100:9090");

        let addr: SocketAddr = addr_str.parse().unwrap();
        assert_eq!(addr.port(), 9090);
    }

    // ==================== AppState Tests ====================

    #[test]
    fn test_app_state_version() {
        let workspace = Workspace::open(&Settings::default()).unwrap();
        let state = AppState::new(workspace);
        assert_eq!(state.version, env!("CARGO_PKG_VERSION"));
        assert!(state.workspace.lock().unwrap().translations().is_empty());
    }
}

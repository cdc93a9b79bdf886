//! Dojo Server - Agent Dojo integration backend
//!
//! A standalone Rust backend server for Agent Dojo, providing:
//! - RESTful HTTP API via axum under `/api/v1/composio`
//! - Composio-backed toolkit connections and tool execution
//! - SQLite connection records with rusqlite
//!
//! This crate can be used standalone or embedded in other applications
//! (e.g., the `dojo` CLI).

pub mod api;

pub use dojo_core::{db, error, integrations, models, state, store};

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use dojo_core::composio::{ComposioApi, ComposioClient, ComposioConfig};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use self::db::Database;
use self::integrations::IntegrationManager;
use self::state::{AppState, AppStateInner};
use self::store::ConnectionStore;

/// Configuration for the Dojo backend server.
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: String,
    /// Composio access. When `None` the composio routes answer 503.
    pub composio: Option<ComposioConfig>,
    /// Optional path to static frontend files.
    /// When set, the server serves these files for all non-API routes.
    pub static_dir: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            db_path: "dojo.db".to_string(),
            composio: None,
            static_dir: None,
        }
    }
}

/// Create a shared `AppState` from a database path and optional Composio
/// configuration.
pub async fn create_app_state(
    db_path: &str,
    composio: Option<ComposioConfig>,
) -> Result<AppState, String> {
    let client = match composio {
        Some(config) => {
            let client = ComposioClient::new(config)
                .map_err(|e| format!("Failed to create Composio client: {}", e))?;
            Some(Arc::new(client) as Arc<dyn ComposioApi>)
        }
        None => {
            tracing::warn!("COMPOSIO_API_KEY not set; integration routes are disabled");
            None
        }
    };
    create_app_state_with(db_path, client)
}

/// Like [`create_app_state`], with an already-built Composio implementation.
pub fn create_app_state_with(
    db_path: &str,
    composio: Option<Arc<dyn ComposioApi>>,
) -> Result<AppState, String> {
    let db = Database::open(db_path).map_err(|e| format!("Failed to open database: {}", e))?;

    let integrations = composio.map(|api| IntegrationManager::new(api, ConnectionStore::new(db)));

    Ok(Arc::new(AppStateInner::new(integrations)))
}

/// Build the application router (API routes, health check, middleware).
pub fn build_router(state: AppState, static_dir: Option<&str>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut app = Router::new()
        .merge(api::api_router())
        .route("/health", axum::routing::get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Serve static frontend files if configured
    if let Some(static_dir) = static_dir {
        let static_path = std::path::Path::new(static_dir);
        if static_path.is_dir() {
            tracing::info!("Serving static frontend from: {}", static_dir);
            let serve_dir = tower_http::services::ServeDir::new(static_dir).not_found_service(
                tower_http::services::ServeFile::new(static_path.join("index.html")),
            );
            app = app.fallback_service(serve_dir);
        } else {
            tracing::warn!(
                "Static directory not found: {}. Frontend won't be served.",
                static_dir
            );
        }
    }

    app
}

/// Start the backend server.
///
/// Returns the actual address the server is listening on.
pub async fn start_server(config: ServerConfig) -> Result<SocketAddr, String> {
    // Initialize tracing
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dojo_server=info,tower_http=info".into()),
        )
        .try_init();

    tracing::info!(
        "Starting Agent Dojo backend server on {}:{}",
        config.host,
        config.port
    );

    let state = create_app_state(&config.db_path, config.composio.clone()).await?;

    start_server_with_state(config, state).await
}

/// Start the HTTP server with a pre-built `AppState`.
pub async fn start_server_with_state(
    config: ServerConfig,
    state: AppState,
) -> Result<SocketAddr, String> {
    let app = build_router(state, config.static_dir.as_deref());

    // Bind and serve
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| format!("Invalid address: {}", e))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("Failed to bind to {}: {}", addr, e))?;

    let local_addr = listener
        .local_addr()
        .map_err(|e| format!("Failed to get local address: {}", e))?;

    tracing::info!("Agent Dojo backend server listening on {}", local_addr);

    // Spawn the server in a background task
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok(local_addr)
}

async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

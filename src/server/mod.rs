//! HTTP service for launch recording, context lookup and grade submission.
//!
//! Lets the hub and the notebook servers talk to one process instead of
//! opening the SQLite file themselves.

pub mod api;
pub mod auth;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::{API_TOKEN_ENV, LtipassConfig};
use crate::outcome::{ConsumerSecrets, HttpOutcomeClient};
use crate::store::{DbHandle, SessionDb, StoreOptions};

pub use api::{AppState, SharedState, api_router};
pub use auth::ApiToken;

/// Configuration for the HTTP service.
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub store: StoreOptions,
    pub consumers: ConsumerSecrets,
    pub outcome_timeout: Duration,
    pub api_token: Option<ApiToken>,
}

impl ServerConfig {
    pub fn from_config(config: &LtipassConfig) -> Self {
        Self {
            host: config.server.host.clone(),
            port: config.server.port,
            db_path: config.store.path.clone(),
            store: config.store_options(),
            consumers: config.consumer_secrets(),
            outcome_timeout: config.outcome_timeout(),
            api_token: config.api_token(),
        }
    }
}

/// Build the full application router with request tracing. `/api/*` routes
/// require `token`.
pub fn build_router(state: SharedState, token: ApiToken) -> Router {
    api_router(token)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP service and run until Ctrl-C.
///
/// Refuses to start without an API token: the routes record launches and
/// sign grades with the consumer secrets.
pub async fn start_server(config: ServerConfig) -> Result<()> {
    let Some(token) = config.api_token else {
        bail!(
            "No API token configured: set [server] api_token in ltipass.toml or ${}",
            API_TOKEN_ENV
        );
    };
    let db = SessionDb::open_with(&config.db_path, config.store)
        .with_context(|| format!("Failed to open session store {}", config.db_path.display()))?;
    let client = HttpOutcomeClient::new(config.outcome_timeout)
        .context("Failed to build outcome HTTP client")?;

    if config.consumers.is_empty() {
        warn!("No consumers configured; grade submission will be rejected");
    }

    let state = Arc::new(AppState::new(
        DbHandle::new(db),
        config.consumers,
        Arc::new(client),
    ));
    let app = build_router(state, token);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    info!(addr = %local_addr, db = %config.db_path.display(), "ltipass service listening");
    println!("ltipass service running at http://{}", local_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to install Ctrl+C handler; running until killed");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

//! Application Startup
//!
//! Application building and server initialization.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use sqlx::SqlitePool;
use tokio::net::TcpListener;

use crate::application::services::{ConnectionService, PresenceRegistry};
use crate::config::Settings;
use crate::domain::MessageStore;
use crate::infrastructure::database;
use crate::infrastructure::repositories::SqliteMessageRepository;
use crate::presentation::http::routes;
use crate::presentation::middleware::{cors, logging};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub store: Arc<dyn MessageStore>,
    pub registry: Arc<PresenceRegistry>,
    pub connections: Arc<ConnectionService>,
    pub settings: Arc<Settings>,
}

impl AppState {
    /// Wire the relay services over an already-migrated pool.
    pub fn new(db: SqlitePool, settings: Settings) -> Self {
        let store: Arc<dyn MessageStore> = Arc::new(SqliteMessageRepository::new(db.clone()));
        let registry = Arc::new(PresenceRegistry::new());
        let connections = Arc::new(ConnectionService::new(
            registry.clone(),
            store.clone(),
            settings.websocket.write_timeout(),
        ));

        Self {
            db,
            store,
            registry,
            connections,
            settings: Arc::new(settings),
        }
    }
}

/// Full router with middleware applied.
pub fn build_router(state: AppState) -> Router {
    let cors = cors::create_cors_layer(&state.settings.cors);
    routes::create_router(state)
        .layer(logging::create_trace_layer())
        .layer(cors)
}

/// Application instance
pub struct Application {
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application from settings
    pub async fn build(settings: Settings) -> Result<Self> {
        let db = database::create_pool(&settings.database).await?;
        database::run_migrations(&db).await?;
        tracing::info!(url = %settings.database.url, "Message store ready");

        let addr = settings.server.socket_addr()?;
        let state = AppState::new(db, settings);
        let router = build_router(state);

        let listener = TcpListener::bind(addr).await?;
        tracing::info!("Listening on {}", listener.local_addr()?);

        Ok(Self { listener, router })
    }

    /// Run the server until Ctrl-C or SIGTERM.
    pub async fn run_until_stopped(self) -> Result<()> {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        tracing::info!("Server stopped");
        Ok(())
    }

    /// Get the bound address
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
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
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
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

    tracing::info!("Shutdown signal received");
}

//! Application startup and lifecycle management.

use crate::config::ToothConfig;
use crate::error::AppError;
use crate::handlers::{health_check, upload_handler};
use crate::services::providers::openai::{OpenAiConfig, OpenAiVisionProvider};
use crate::services::providers::VisionProvider;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ToothConfig,
    pub provider: Arc<dyn VisionProvider>,
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the OpenAI provider from config.
    pub async fn build(config: ToothConfig) -> Result<Self, AppError> {
        let provider: Arc<dyn VisionProvider> = Arc::new(OpenAiVisionProvider::new(OpenAiConfig {
            api_key: config.openai.api_key.clone(),
            model: config.openai.model.clone(),
            api_base: config.openai.api_base.clone(),
        }));

        tracing::info!(model = %config.openai.model, "Initialized OpenAI vision provider");

        Self::build_with_provider(config, provider).await
    }

    /// Build with an injected provider (tests use a mock here).
    pub async fn build_with_provider(
        config: ToothConfig,
        provider: Arc<dyn VisionProvider>,
    ) -> Result<Self, AppError> {
        tokio::fs::create_dir_all(&config.uploads.dir).await?;

        // Port 0 = random port for testing.
        let address: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
            .parse()
            .map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!("invalid bind address: {}", e))
            })?;
        let listener = TcpListener::bind(address).await.map_err(|e| {
            tracing::error!("Failed to bind listener to {}: {}", address, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        let state = AppState { config, provider };

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let app = build_router(self.state);
        axum::serve(self.listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
    }
}

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.server.max_upload_mb * 1024 * 1024;

    Router::new()
        .route("/health", get(health_check))
        .route("/upload", post(upload_handler))
        .route_service("/", ServeFile::new("static/index.html"))
        .nest_service("/static", ServeDir::new("static"))
        .layer(DefaultBodyLimit::max(body_limit))
        // The browser demo page may be served from anywhere.
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

pub mod access;
pub mod attachments;
pub mod config;
pub mod errors;
pub mod input_log;
pub mod locks;
pub mod mailbox;
pub mod models;
pub mod routes;
pub mod service;

use crate::config::AppSettings;
use crate::service::IntakeService;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::path::Path;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<IntakeService>,
}

impl AppState {
    pub fn new(settings: AppSettings) -> Self {
        Self {
            service: Arc::new(IntakeService::new(settings)),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let max_body_bytes = state.service.settings().max_body_bytes;
    Router::new()
        .route("/healthz", get(routes::healthz))
        .route("/api/prompt-auth", post(routes::prompt_auth))
        .route("/api/leon-message", post(routes::leave_message))
        .route("/api/leave-message", post(routes::leave_message))
        .route("/api/user-input-log", post(routes::user_input_log))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run(settings: AppSettings) -> anyhow::Result<()> {
    std::fs::create_dir_all(&settings.data_dir)?;
    init_tracing(&settings.log_path()).map_err(anyhow::Error::msg)?;

    let bind_address = settings.bind_address.clone();
    tracing::info!(
        data_dir = %settings.data_dir.to_string_lossy(),
        message_file = %settings.message_path().to_string_lossy(),
        input_log = %settings.input_log_path().to_string_lossy(),
        "starting chat intake"
    );
    let app = build_router(AppState::new(settings));

    let listener = tokio::net::TcpListener::bind(bind_address.as_str()).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("chat intake stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %error, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

fn init_tracing(log_dir: &Path) -> Result<(), String> {
    std::fs::create_dir_all(log_dir).map_err(|error| error.to_string())?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "intake.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .with_writer(non_blocking)
        .try_init()
        .map_err(|error| error.to_string())
}

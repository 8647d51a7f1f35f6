// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use std::{net::SocketAddr, sync::Arc, time::Duration};
use tower_http::{compression::CompressionLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;

use crate::application::health_predictor::{
    HealthPredictor, RemoteHealthPredictor, StreamedHealthPredictor,
};
use crate::application::machine_backend::MachineBackend;
use crate::application::monitor_service::MonitorService;
use crate::infrastructure::config::{PredictorMode, load_monitor_config};
use crate::infrastructure::http_backend::HttpMachineBackend;
use crate::infrastructure::preferences_store::PreferenceStore;
use crate::infrastructure::ws_source::WsTelemetrySource;
use crate::presentation::app_state::AppState;
use crate::presentation::router::build_router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = load_monitor_config()?;

    // Collaborators (infrastructure layer)
    let backend: Arc<dyn MachineBackend> = Arc::new(HttpMachineBackend::new(
        &config.backend.http_base,
        Duration::from_millis(config.backend.request_timeout_ms),
    )?);
    let source = Arc::new(WsTelemetrySource::new(
        &config.backend.ws_base,
        &config.backend.stream_path,
    ));
    let predictor: Arc<dyn HealthPredictor> = match config.predictor {
        PredictorMode::Stream => Arc::new(StreamedHealthPredictor),
        PredictorMode::Remote => Arc::new(RemoteHealthPredictor::new(backend.clone())),
    };

    // Services (application layer)
    let monitor = MonitorService::new(
        backend,
        predictor,
        source,
        config.stream.settings(),
        config.toasts.policy(),
        config.window_presets()?,
    );

    let state = Arc::new(AppState {
        monitor,
        preferences: PreferenceStore::new(config.preferences.path.clone()),
    });

    let router = build_router(state)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = config.server.listen.parse()?;
    tracing::info!(%addr, backend = %config.backend.http_base, "starting twin-monitor");

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router).await?;

    Ok(())
}

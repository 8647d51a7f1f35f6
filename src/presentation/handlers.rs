// HTTP request handlers
use crate::application::monitor_service::MonitorError;
use crate::domain::health::ControlCommand;
use crate::domain::preferences::Preferences;
use crate::presentation::app_state::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use std::fmt::Display;
use std::sync::Arc;
use tokio_stream::wrappers::WatchStream;

const LIVE_PRESET: &str = "realtime";
const HISTORY_PRESET: &str = "historical";

#[derive(Deserialize)]
pub struct TargetRequest {
    pub machine_id: String,
    #[serde(default = "default_playing")]
    pub playing: bool,
}

fn default_playing() -> bool {
    true
}

#[derive(Deserialize)]
pub struct PlayingRequest {
    pub playing: bool,
}

#[derive(Deserialize)]
pub struct WindowQuery {
    pub preset: Option<String>,
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub preset: Option<String>,
    pub until: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
pub struct ExportQuery {
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
}

fn error_response(status: StatusCode, message: impl Display) -> Response {
    (status, Json(json!({ "error": message.to_string() }))).into_response()
}

fn backend_failure(context: &str, error: impl Display) -> Response {
    tracing::warn!(error = %error, "{context}");
    error_response(StatusCode::BAD_GATEWAY, format!("{context}: {error}"))
}

fn monitor_failure(context: &str, error: MonitorError) -> Response {
    match error {
        MonitorError::UnknownPreset(_) => error_response(StatusCode::NOT_FOUND, error),
        MonitorError::Backend(e) => backend_failure(context, e),
    }
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// List known machines; empty when the backend is unreachable
pub async fn list_machines(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.monitor.list_machines().await)
}

pub async fn select_target(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TargetRequest>,
) -> Response {
    if request.machine_id.trim().is_empty() {
        return error_response(StatusCode::UNPROCESSABLE_ENTITY, "machine_id must not be empty");
    }
    Json(state.monitor.select_machine(&request.machine_id, request.playing)).into_response()
}

pub async fn set_playing(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PlayingRequest>,
) -> impl IntoResponse {
    Json(state.monitor.set_playing(request.playing))
}

/// Restart the link after retries ran out
pub async fn reconnect(State(state): State<Arc<AppState>>) -> Response {
    if state.monitor.reconnect() {
        Json(state.monitor.status()).into_response()
    } else {
        error_response(StatusCode::CONFLICT, "no playing target to reconnect")
    }
}

pub async fn stop_session(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.monitor.stop_session())
}

pub async fn session_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.monitor.status())
}

pub async fn session_window(
    Query(query): Query<WindowQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let preset = query.preset.as_deref().unwrap_or(LIVE_PRESET);
    match state.monitor.live_window(preset) {
        Ok(view) => Json(view).into_response(),
        Err(e) => monitor_failure("failed to window live telemetry", e),
    }
}

/// Server-sent windowed views, one per buffer change
pub async fn session_stream(
    Query(query): Query<WindowQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let preset = query.preset.unwrap_or_else(|| LIVE_PRESET.to_string());
    if let Err(e) = state.monitor.preset(&preset) {
        return monitor_failure("failed to open window stream", e);
    }

    let mut snapshots = WatchStream::new(state.monitor.subscribe_samples());
    let events = async_stream::stream! {
        while let Some(samples) = snapshots.next().await {
            let machine_id = samples
                .last()
                .map(|sample| sample.machine_id.clone())
                .or_else(|| state.monitor.status().machine_id);
            let view = match state.monitor.window_of(&preset, machine_id, &samples) {
                Ok(view) => view,
                Err(e) => {
                    tracing::warn!(error = %e, "window stream stopped");
                    break;
                }
            };
            match Event::default().event("window").json_data(&view) {
                Ok(event) => yield Ok::<Event, Infallible>(event),
                Err(e) => tracing::warn!(error = %e, "failed to encode window event"),
            }
        }
    };

    Sse::new(events).keep_alive(KeepAlive::default()).into_response()
}

/// Windowed backend history; an empty view when the backend is unreachable
pub async fn history(
    Query(query): Query<HistoryQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let preset = query.preset.as_deref().unwrap_or(HISTORY_PRESET);
    match state.monitor.history_window(preset, query.until).await {
        Ok(view) => Json(view).into_response(),
        Err(MonitorError::Backend(e)) => {
            tracing::warn!(error = %e, "failed to fetch sensor history");
            match state.monitor.window_of(preset, None, &[]) {
                Ok(view) => Json(view).into_response(),
                Err(e) => monitor_failure("failed to window sensor history", e),
            }
        }
        Err(e) => monitor_failure("failed to window sensor history", e),
    }
}

pub async fn machine_health(
    Path(machine_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Response {
    match state.monitor.health(&machine_id).await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => monitor_failure("failed to fetch machine health", e),
    }
}

pub async fn list_toasts(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.monitor.toasts())
}

pub async fn dismiss_toast(Path(id): Path<u64>, State(state): State<Arc<AppState>>) -> Response {
    if state.monitor.dismiss_toast(id) {
        StatusCode::NO_CONTENT.into_response()
    } else {
        error_response(StatusCode::NOT_FOUND, format!("no visible toast {id}"))
    }
}

pub async fn list_logs(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.monitor.logs().await)
}

pub async fn export_logs(
    Query(query): Query<ExportQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    match state
        .monitor
        .backend()
        .export_logs(query.start_time, query.end_time)
        .await
    {
        Ok(csv) => (
            [
                (header::CONTENT_TYPE, "text/csv"),
                (header::CONTENT_DISPOSITION, "attachment; filename=sensor_logs.csv"),
            ],
            csv,
        )
            .into_response(),
        Err(e) => backend_failure("failed to export logs", e),
    }
}

pub async fn activate_scenario(
    Path(scenario_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Response {
    match state.monitor.backend().activate_scenario(&scenario_id).await {
        Ok(body) => Json(body).into_response(),
        Err(e) => backend_failure("failed to activate scenario", e),
    }
}

pub async fn toggle_failure_mode(
    Path((mode_id, action)): Path<(String, String)>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let active = match action.as_str() {
        "activate" => true,
        "deactivate" => false,
        other => return error_response(StatusCode::NOT_FOUND, format!("unknown action {other}")),
    };

    match state.monitor.backend().set_failure_mode(&mode_id, active).await {
        Ok(body) => Json(body).into_response(),
        Err(e) => backend_failure("failed to toggle failure mode", e),
    }
}

pub async fn control_machine(
    State(state): State<Arc<AppState>>,
    Json(command): Json<ControlCommand>,
) -> Response {
    match state.monitor.backend().control(&command).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => backend_failure("machine control failed", e),
    }
}

pub async fn explain_failure(
    State(state): State<Arc<AppState>>,
    Json(features): Json<serde_json::Map<String, serde_json::Value>>,
) -> Response {
    match state.monitor.backend().explain_failure(&features).await {
        Ok(explanation) => Json(explanation).into_response(),
        Err(e) => backend_failure("failed to explain failure", e),
    }
}

pub async fn get_preferences(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.preferences.load().await)
}

pub async fn put_preferences(
    State(state): State<Arc<AppState>>,
    Json(preferences): Json<Preferences>,
) -> Response {
    match state.preferences.save(&preferences).await {
        Ok(()) => Json(preferences).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to save preferences");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}

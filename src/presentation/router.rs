// Route table
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::*;
use axum::{
    Router,
    routing::{delete, get, post},
};
use std::sync::Arc;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/machines", get(list_machines))
        .route("/machines/:id/health", get(machine_health))
        .route("/session/target", post(select_target))
        .route("/session/playing", post(set_playing))
        .route("/session/reconnect", post(reconnect))
        .route("/session/stop", post(stop_session))
        .route("/session/status", get(session_status))
        .route("/session/window", get(session_window))
        .route("/session/stream", get(session_stream))
        .route("/history", get(history))
        .route("/toasts", get(list_toasts))
        .route("/toasts/:id", delete(dismiss_toast))
        .route("/logs", get(list_logs))
        .route("/logs/export", get(export_logs))
        .route("/scenarios/:id/activate", post(activate_scenario))
        .route("/failure-modes/:id/:action", post(toggle_failure_mode))
        .route("/machine/control", post(control_machine))
        .route("/explain/failure", post(explain_failure))
        .route("/preferences", get(get_preferences).put(put_preferences))
        .with_state(state)
}

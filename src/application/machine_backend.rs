// Backend trait for the machine REST collaborators
use crate::domain::health::{ControlCommand, ControlResponse, Explanation, HealthSnapshot, LogEntry};
use crate::domain::machine::Machine;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request to machine backend failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("machine backend returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("no prediction available: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait MachineBackend: Send + Sync {
    /// Known machines
    async fn list_machines(&self) -> Result<Vec<Machine>, BackendError>;

    /// Current health prediction for the running machine
    async fn health(&self) -> Result<HealthSnapshot, BackendError>;

    /// System log, newest first
    async fn logs(&self) -> Result<Vec<LogEntry>, BackendError>;

    /// Sensor log as CSV, optionally bounded by epoch seconds
    async fn export_logs(
        &self,
        start_time: Option<f64>,
        end_time: Option<f64>,
    ) -> Result<String, BackendError>;

    /// Raw historical payloads, oldest first
    async fn sensor_history(&self) -> Result<Vec<serde_json::Value>, BackendError>;

    async fn activate_scenario(&self, scenario_id: &str) -> Result<serde_json::Value, BackendError>;

    async fn set_failure_mode(
        &self,
        mode_id: &str,
        active: bool,
    ) -> Result<serde_json::Value, BackendError>;

    async fn control(&self, command: &ControlCommand) -> Result<ControlResponse, BackendError>;

    async fn explain_failure(
        &self,
        features: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Explanation, BackendError>;
}

// Health, log and control domain models shared with the machine backend
use super::telemetry::AlertNotice;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub anomaly_score: f64,
    pub failure_probability: f64,
    pub rul_hours: f64,
    #[serde(default)]
    pub component_health: HashMap<String, f64>,
    #[serde(default)]
    pub alerts: Vec<AlertNotice>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: u64,
    /// Milliseconds since the epoch.
    pub timestamp: f64,
    pub event: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub machine_id: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlCommand {
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlResponse {
    pub success: bool,
    pub message: String,
    pub timestamp: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub shap_values: Vec<f64>,
    pub feature_names: Vec<String>,
    pub base_value: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_snapshot_tolerates_missing_collections() {
        let snapshot: HealthSnapshot = serde_json::from_str(
            r#"{"anomaly_score":0.2,"failure_probability":0.1,"rul_hours":420.0}"#,
        )
        .unwrap();
        assert!(snapshot.component_health.is_empty());
        assert!(snapshot.alerts.is_empty());
    }

    #[test]
    fn test_log_entry_wire_shape() {
        let entry: LogEntry = serde_json::from_str(
            r#"{"id":3,"timestamp":1700000000000.0,"event":"Simulation started","type":"info","machine_id":"armpi_fpv_01","user":"Operator"}"#,
        )
        .unwrap();
        assert_eq!(entry.kind, "info");
        assert_eq!(entry.user.as_deref(), Some("Operator"));
    }
}

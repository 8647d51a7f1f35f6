// Field mapping - Backend payload keys onto canonical telemetry channels
use crate::domain::telemetry::{AlertNotice, Channel, Severity, TelemetrySample};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("frame is not a JSON object")]
    NotAnObject,
    #[error("backend reported an error: {0}")]
    Backend(String),
}

/// Candidate source keys per channel, highest priority first.
pub fn candidate_keys(channel: Channel) -> &'static [&'static str] {
    match channel {
        Channel::Temperature => &[
            "temperature_core",
            "bearing_temperature",
            "spindle_temperature",
            "temperature",
        ],
        Channel::Vibration => &[
            "vibration_level",
            "vibration_spindle",
            "vibration_motor",
            "vibration_pump",
            "vibration",
        ],
        Channel::Power => &["power_consumption", "power"],
        Channel::Torque => &["motor_torque", "joint_1_torque", "torque"],
        Channel::JointAngle => &["joint_1_angle", "axis_x_position", "joint_angle"],
        Channel::Speed => &["spindle_speed", "belt_speed", "flow_rate", "joint_1_velocity"],
    }
}

const ANOMALY_KEYS: &[&str] = &["anomaly_score"];
const FAILURE_KEYS: &[&str] = &["failure_probability"];
const RUL_KEYS: &[&str] = &["rul_hours", "remaining_useful_life_hours"];

/// First candidate holding a finite number. Present but unusable values are skipped.
pub fn first_finite(payload: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .filter_map(|key| payload.get(*key))
        .filter_map(Value::as_f64)
        .find(|value| value.is_finite())
}

/// Parse one stream frame into a sample tagged with `machine_id`.
pub fn map_frame(machine_id: &str, text: &str) -> Result<TelemetrySample, FrameError> {
    let raw: Value = serde_json::from_str(text)?;
    map_payload(machine_id, raw, Utc::now())
}

/// Map an already decoded payload. `received_at` stands in for a missing timestamp.
pub fn map_payload(
    machine_id: &str,
    raw: Value,
    received_at: DateTime<Utc>,
) -> Result<TelemetrySample, FrameError> {
    let payload = raw.as_object().ok_or(FrameError::NotAnObject)?;

    if let Some(error) = payload.get("error").and_then(Value::as_str) {
        return Err(FrameError::Backend(error.to_string()));
    }

    let channels: BTreeMap<Channel, f64> = Channel::ALL
        .iter()
        .filter_map(|channel| {
            first_finite(payload, candidate_keys(*channel)).map(|value| (*channel, value))
        })
        .collect();

    let captured_at = first_finite(payload, &["timestamp"])
        .and_then(|seconds| DateTime::from_timestamp_millis((seconds * 1000.0).round() as i64))
        .unwrap_or(received_at);

    let sample = TelemetrySample {
        machine_id: machine_id.to_string(),
        captured_at,
        channels,
        anomaly_score: first_finite(payload, ANOMALY_KEYS),
        failure_probability: first_finite(payload, FAILURE_KEYS),
        remaining_useful_life_hours: first_finite(payload, RUL_KEYS),
        alerts: map_alerts(payload.get("alerts")),
        raw,
    };

    Ok(sample)
}

fn map_alerts(value: Option<&Value>) -> Vec<AlertNotice> {
    let Some(entries) = value.and_then(Value::as_array) else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            let severity = entry.get("type")?.as_str()?;
            let title = entry.get("title")?.as_str()?;
            let message = entry.get("message")?.as_str()?;
            Some(AlertNotice::new(Severity::parse(severity), title, message))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_first_defined_key_wins() {
        let payload = json!({ "bearing_temperature": 41.0, "temperature": 99.0 });
        let sample = map_payload("pump_01", payload, Utc::now()).unwrap();
        assert_eq!(sample.channel(Channel::Temperature), Some(41.0));
    }

    #[test]
    fn test_priority_order_over_payload_order() {
        let payload = json!({ "axis_x_position": 12.5, "joint_1_angle": 45.0 });
        let sample = map_payload("robot_01", payload, Utc::now()).unwrap();
        assert_eq!(sample.channel(Channel::JointAngle), Some(45.0));
    }

    #[test]
    fn test_non_numeric_candidate_is_skipped() {
        let payload = json!({ "temperature_core": null, "spindle_temperature": "hot", "temperature": 38.5 });
        let sample = map_payload("cnc_01", payload, Utc::now()).unwrap();
        assert_eq!(sample.channel(Channel::Temperature), Some(38.5));
    }

    #[test]
    fn test_missing_channel_is_absent() {
        let payload = json!({ "temperature_core": 40.0 });
        let sample = map_payload("robot_01", payload, Utc::now()).unwrap();
        assert_eq!(sample.channel(Channel::Vibration), None);
        assert!(!sample.channels.contains_key(&Channel::Power));
    }

    #[test]
    fn test_timestamp_seconds_are_used() {
        let payload = json!({ "timestamp": 1_700_000_000.25, "vibration_level": 1.2 });
        let sample = map_payload("robot_01", payload, Utc::now()).unwrap();
        assert_eq!(sample.captured_at.timestamp_millis(), 1_700_000_000_250);
    }

    #[test]
    fn test_missing_timestamp_falls_back_to_receive_time() {
        let received = DateTime::from_timestamp_millis(42_000).unwrap();
        let sample = map_payload("robot_01", json!({}), received).unwrap();
        assert_eq!(sample.captured_at, received);
    }

    #[test]
    fn test_derived_fields_and_alerts() {
        let payload = json!({
            "anomaly_score": 0.82,
            "failure_probability": 0.4,
            "remaining_useful_life_hours": 75.0,
            "alerts": [
                { "type": "critical", "title": "Critical Anomaly", "message": "Critical anomaly score: 0.82" },
                { "type": "warning", "title": "Missing message" },
                { "type": "notice", "title": "Heartbeat", "message": "ok" }
            ]
        });
        let sample = map_payload("robot_01", payload, Utc::now()).unwrap();
        assert_eq!(sample.anomaly_score, Some(0.82));
        assert_eq!(sample.failure_probability, Some(0.4));
        assert_eq!(sample.remaining_useful_life_hours, Some(75.0));
        assert_eq!(sample.alerts.len(), 2);
        assert_eq!(sample.alerts[0].severity, Severity::Critical);
        assert_eq!(sample.alerts[1].severity, Severity::Info);
    }

    #[test]
    fn test_raw_payload_is_preserved() {
        let sample = map_frame("robot_01", r#"{"joint_2_angle": 12.0, "status": "running"}"#).unwrap();
        assert_eq!(sample.raw["status"], "running");
        assert_eq!(sample.raw["joint_2_angle"], 12.0);
    }

    #[test]
    fn test_malformed_frames() {
        assert!(matches!(map_frame("robot_01", "not json"), Err(FrameError::Malformed(_))));
        assert!(matches!(map_frame("robot_01", "[1, 2]"), Err(FrameError::NotAnObject)));
        assert!(matches!(
            map_frame("robot_01", r#"{"error": "Simulator not initialized"}"#),
            Err(FrameError::Backend(_))
        ));
    }
}

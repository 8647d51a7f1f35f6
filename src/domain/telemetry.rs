// Telemetry data domain models
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Canonical measurement channels, independent of machine type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Temperature,
    Vibration,
    Power,
    Torque,
    JointAngle,
    Speed,
}

impl Channel {
    pub const ALL: [Channel; 6] = [
        Channel::Temperature,
        Channel::Vibration,
        Channel::Power,
        Channel::Torque,
        Channel::JointAngle,
        Channel::Speed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Temperature => "temperature",
            Channel::Vibration => "vibration",
            Channel::Power => "power",
            Channel::Torque => "torque",
            Channel::JointAngle => "joint_angle",
            Channel::Speed => "speed",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Channel::Temperature => "Temperature",
            Channel::Vibration => "Vibration",
            Channel::Power => "Power",
            Channel::Torque => "Torque",
            Channel::JointAngle => "Joint Angle",
            Channel::Speed => "Speed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

impl Severity {
    /// Unknown labels are treated as informational.
    pub fn parse(label: &str) -> Self {
        match label {
            "critical" => Severity::Critical,
            "warning" => Severity::Warning,
            _ => Severity::Info,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertNotice {
    #[serde(rename = "type")]
    pub severity: Severity,
    pub title: String,
    pub message: String,
}

impl AlertNotice {
    pub fn new(severity: Severity, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            title: title.into(),
            message: message.into(),
        }
    }
}

/// One machine measurement at a point in time.
///
/// Channel values are always finite; a channel the payload did not carry is
/// simply missing from `channels`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetrySample {
    pub machine_id: String,
    pub captured_at: DateTime<Utc>,
    pub channels: BTreeMap<Channel, f64>,
    pub anomaly_score: Option<f64>,
    pub failure_probability: Option<f64>,
    pub remaining_useful_life_hours: Option<f64>,
    pub alerts: Vec<AlertNotice>,
    pub raw: serde_json::Value,
}

impl TelemetrySample {
    pub fn channel(&self, channel: Channel) -> Option<f64> {
        self.channels.get(&channel).copied()
    }
}

/// Anything with a millisecond timestamp can be windowed.
pub trait TimePoint {
    fn time_ms(&self) -> i64;
}

impl TimePoint for TelemetrySample {
    fn time_ms(&self) -> i64 {
        self.captured_at.timestamp_millis()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeriesPoint {
    pub time_ms: i64,
    pub value: f64,
}

impl TimeSeriesPoint {
    pub fn new(time_ms: i64, value: f64) -> Self {
        Self { time_ms, value }
    }
}

impl TimePoint for TimeSeriesPoint {
    fn time_ms(&self) -> i64 {
        self.time_ms
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SeriesData {
    pub id: String,
    pub name: String,
    pub points: Vec<TimeSeriesPoint>,
}

impl SeriesData {
    pub fn new(id: String, name: String, points: Vec<TimeSeriesPoint>) -> Self {
        Self { id, name, points }
    }
}

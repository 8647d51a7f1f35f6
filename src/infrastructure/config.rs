use crate::application::monitor_service::WindowPresets;
use crate::application::stream_adapter::{RetryPolicy, StreamSettings};
use crate::application::toast_center::ToastPolicy;
use crate::domain::window::{PolicyError, WindowPolicy, WindowStrategy};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct MonitorConfig {
    pub server: ServerSettings,
    pub backend: BackendSettings,
    pub stream: StreamConfig,
    pub toasts: ToastConfig,
    pub windows: HashMap<String, WindowConfig>,
    pub preferences: PreferencesConfig,
    pub predictor: PredictorMode,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerSettings {
    pub listen: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BackendSettings {
    pub http_base: String,
    pub ws_base: String,
    /// Path template; `${machine_id}` is replaced with the encoded id.
    pub stream_path: String,
    pub request_timeout_ms: u64,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            http_base: "http://localhost:7000".to_string(),
            ws_base: "ws://localhost:7000".to_string(),
            stream_path: "/ws/machines/${machine_id}".to_string(),
            request_timeout_ms: 5000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StreamConfig {
    pub capacity: usize,
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            capacity: 30,
            max_attempts: 5,
            initial_backoff_ms: 500,
            max_backoff_ms: 10_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl StreamConfig {
    pub fn settings(&self) -> StreamSettings {
        StreamSettings {
            capacity: self.capacity,
            retry: RetryPolicy {
                max_attempts: self.max_attempts,
                initial_delay: Duration::from_millis(self.initial_backoff_ms),
                max_delay: Duration::from_millis(self.max_backoff_ms),
                multiplier: self.backoff_multiplier,
            },
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ToastConfig {
    pub cooldown_ms: u64,
    pub display_ms: u64,
    pub history_limit: usize,
}

impl Default for ToastConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: 10_000,
            display_ms: 5000,
            history_limit: 50,
        }
    }
}

impl ToastConfig {
    pub fn policy(&self) -> ToastPolicy {
        ToastPolicy {
            cooldown: Duration::from_millis(self.cooldown_ms),
            display_for: Duration::from_millis(self.display_ms),
            history_limit: self.history_limit,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct WindowConfig {
    pub count_limit: usize,
    #[serde(default)]
    pub time_window_seconds: Option<u64>,
    pub strategy: WindowStrategy,
    #[serde(default)]
    pub point_budget: Option<usize>,
}

impl TryFrom<&WindowConfig> for WindowPolicy {
    type Error = PolicyError;

    fn try_from(config: &WindowConfig) -> Result<Self, Self::Error> {
        let policy = WindowPolicy::new(
            config.count_limit,
            config.time_window_seconds.map(Duration::from_secs),
            config.strategy,
        )?;
        match config.point_budget {
            Some(budget) => policy.with_point_budget(budget),
            None => Ok(policy),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PreferencesConfig {
    pub path: PathBuf,
}

impl Default for PreferencesConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/preferences.toml"),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PredictorMode {
    #[default]
    Stream,
    Remote,
}

impl MonitorConfig {
    /// Built-in presets overridden by any configured ones.
    pub fn window_presets(&self) -> Result<WindowPresets, PolicyError> {
        let mut presets = WindowPresets::default();
        for (name, window) in &self.windows {
            presets.insert(name.clone(), WindowPolicy::try_from(window)?);
        }
        Ok(presets)
    }
}

pub fn load_monitor_config() -> anyhow::Result<MonitorConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/monitor").required(false))
        .add_source(
            config::Environment::with_prefix("TWIN")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}

/// Replace template variables in a path or query string
pub fn prepare_template(template: &str, vars: &HashMap<String, String>) -> String {
    let mut result = template.to_string();
    for (key, value) in vars {
        let placeholder = format!("${{{}}}", key);
        result = result.replace(&placeholder, value);
    }
    result
}

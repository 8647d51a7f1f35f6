// Monitor service - Use cases behind the dashboard surface
use crate::application::field_mapping::map_payload;
use crate::application::health_predictor::HealthPredictor;
use crate::application::machine_backend::{BackendError, MachineBackend};
use crate::application::stream_adapter::{StreamAdapter, StreamConnection, StreamSettings};
use crate::application::telemetry_source::TelemetrySource;
use crate::application::toast_center::{ToastCenter, ToastPolicy};
use crate::application::window_selector::{channel_series, select_window};
use crate::domain::health::{HealthSnapshot, LogEntry};
use crate::domain::machine::Machine;
use crate::domain::telemetry::{Channel, SeriesData, TelemetrySample};
use crate::domain::toast::ToastAlert;
use crate::domain::window::{PolicySummary, WindowPolicy, WindowStrategy};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("unknown window preset: {0}")]
    UnknownPreset(String),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Named window policies, one per chart flavour.
#[derive(Debug, Clone)]
pub struct WindowPresets {
    presets: HashMap<String, WindowPolicy>,
}

impl WindowPresets {
    pub fn get(&self, name: &str) -> Option<&WindowPolicy> {
        self.presets.get(name)
    }

    pub fn insert(&mut self, name: String, policy: WindowPolicy) {
        self.presets.insert(name, policy);
    }
}

impl Default for WindowPresets {
    fn default() -> Self {
        let mut presets = HashMap::new();
        if let Ok(policy) =
            WindowPolicy::new(100, Some(Duration::from_secs(60)), WindowStrategy::KeepAll)
        {
            presets.insert("realtime".to_string(), policy);
        }
        if let Ok(policy) = WindowPolicy::new(
            500,
            Some(Duration::from_secs(24 * 3600)),
            WindowStrategy::DecimateUniform,
        )
        .and_then(|policy| policy.with_point_budget(150))
        {
            presets.insert("historical".to_string(), policy);
        }
        if let Ok(policy) = WindowPolicy::new(300, None, WindowStrategy::DecimateLatestBiased) {
            presets.insert("playback".to_string(), policy);
        }
        Self { presets }
    }
}

/// Render-ready slice of telemetry for one chart.
#[derive(Debug, Clone, Serialize)]
pub struct WindowedView {
    pub preset: String,
    pub policy: PolicySummary,
    pub machine_id: Option<String>,
    pub sample_count: usize,
    pub latest: Option<TelemetrySample>,
    pub series: Vec<SeriesData>,
}

impl WindowedView {
    fn build(
        preset: &str,
        policy: &WindowPolicy,
        machine_id: Option<String>,
        samples: &[TelemetrySample],
    ) -> Self {
        let windowed = select_window(samples, policy);
        let series = Channel::ALL
            .iter()
            .map(|channel| channel_series(&windowed, *channel))
            .filter(|series| !series.points.is_empty())
            .collect();

        Self {
            preset: preset.to_string(),
            policy: policy.into(),
            machine_id,
            sample_count: windowed.len(),
            latest: windowed.last().cloned(),
            series,
        }
    }
}

pub struct MonitorService {
    backend: Arc<dyn MachineBackend>,
    predictor: Arc<dyn HealthPredictor>,
    adapter: Mutex<StreamAdapter>,
    samples: watch::Receiver<Arc<[TelemetrySample]>>,
    status: watch::Receiver<StreamConnection>,
    toasts: Arc<Mutex<ToastCenter>>,
    presets: WindowPresets,
    alert_listener: JoinHandle<()>,
}

impl MonitorService {
    pub fn new(
        backend: Arc<dyn MachineBackend>,
        predictor: Arc<dyn HealthPredictor>,
        source: Arc<dyn TelemetrySource>,
        stream_settings: StreamSettings,
        toast_policy: ToastPolicy,
        presets: WindowPresets,
    ) -> Self {
        let adapter = StreamAdapter::new(source, stream_settings);
        let samples = adapter.subscribe();
        let status = adapter.subscribe_status();
        let toasts = Arc::new(Mutex::new(ToastCenter::new(toast_policy)));
        let alert_listener = spawn_alert_listener(adapter.subscribe(), toasts.clone());

        Self {
            backend,
            predictor,
            adapter: Mutex::new(adapter),
            samples,
            status,
            toasts,
            presets,
            alert_listener,
        }
    }

    pub fn backend(&self) -> &Arc<dyn MachineBackend> {
        &self.backend
    }

    pub async fn list_machines(&self) -> Vec<Machine> {
        match self.backend.list_machines().await {
            Ok(machines) => machines
                .into_iter()
                .map(Machine::with_display_name)
                .collect(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to list machines");
                Vec::new()
            }
        }
    }

    pub async fn logs(&self) -> Vec<LogEntry> {
        match self.backend.logs().await {
            Ok(logs) => logs,
            Err(e) => {
                tracing::warn!(error = %e, "failed to fetch logs");
                Vec::new()
            }
        }
    }

    pub fn select_machine(&self, machine_id: &str, playing: bool) -> StreamConnection {
        let mut adapter = lock(&self.adapter);
        adapter.set_target(machine_id, playing);
        adapter.status()
    }

    pub fn set_playing(&self, playing: bool) -> StreamConnection {
        let mut adapter = lock(&self.adapter);
        adapter.set_playing(playing);
        adapter.status()
    }

    pub fn reconnect(&self) -> bool {
        lock(&self.adapter).reconnect()
    }

    /// Close the link and forget the selected machine.
    pub fn stop_session(&self) -> StreamConnection {
        let mut adapter = lock(&self.adapter);
        adapter.stop();
        adapter.status()
    }

    pub fn status(&self) -> StreamConnection {
        self.status.borrow().clone()
    }

    pub fn subscribe_samples(&self) -> watch::Receiver<Arc<[TelemetrySample]>> {
        self.samples.clone()
    }

    pub fn preset(&self, name: &str) -> Result<&WindowPolicy, MonitorError> {
        self.presets
            .get(name)
            .ok_or_else(|| MonitorError::UnknownPreset(name.to_string()))
    }

    /// Windowed view over the live buffer.
    pub fn live_window(&self, preset: &str) -> Result<WindowedView, MonitorError> {
        let policy = self.preset(preset)?;
        let (samples, machine_id) = {
            let adapter = lock(&self.adapter);
            (adapter.snapshot(), adapter.machine_id().map(str::to_string))
        };
        Ok(WindowedView::build(preset, policy, machine_id, &samples))
    }

    /// Same as [`live_window`](Self::live_window) but for an arbitrary snapshot.
    pub fn window_of(
        &self,
        preset: &str,
        machine_id: Option<String>,
        samples: &[TelemetrySample],
    ) -> Result<WindowedView, MonitorError> {
        let policy = self.preset(preset)?;
        Ok(WindowedView::build(preset, policy, machine_id, samples))
    }

    /// Windowed view over the backend's sensor log, ending at `until` when given.
    pub async fn history_window(
        &self,
        preset: &str,
        until: Option<DateTime<Utc>>,
    ) -> Result<WindowedView, MonitorError> {
        let policy = self.preset(preset)?.clone();
        let payloads = self.backend.sensor_history().await?;
        let fallback_id = lock(&self.adapter)
            .machine_id()
            .unwrap_or("unknown")
            .to_string();

        let mut samples: Vec<TelemetrySample> = payloads
            .into_iter()
            .filter_map(|payload| {
                let machine_id = payload
                    .get("machine_id")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or(&fallback_id)
                    .to_string();
                match map_payload(&machine_id, payload, Utc::now()) {
                    Ok(sample) => Some(sample),
                    Err(e) => {
                        tracing::debug!(error = %e, "skipping historical record");
                        None
                    }
                }
            })
            .filter(|sample| until.is_none_or(|limit| sample.captured_at <= limit))
            .collect();
        samples.sort_by_key(|sample| sample.captured_at);

        let machine_id = samples.last().map(|sample| sample.machine_id.clone());
        Ok(WindowedView::build(preset, &policy, machine_id, &samples))
    }

    /// Health for `machine_id`, from its latest live sample when there is one.
    pub async fn health(&self, machine_id: &str) -> Result<HealthSnapshot, MonitorError> {
        let latest = self
            .samples
            .borrow()
            .last()
            .filter(|sample| sample.machine_id == machine_id)
            .cloned();

        match latest {
            Some(sample) => match self.predictor.predict(&sample).await {
                Ok(snapshot) => Ok(snapshot),
                Err(e) => {
                    tracing::debug!(machine_id, error = %e, "predictor unavailable, asking backend");
                    Ok(self.backend.health().await?)
                }
            },
            None => Ok(self.backend.health().await?),
        }
    }

    pub fn toasts(&self) -> Vec<ToastAlert> {
        lock(&self.toasts).active(Instant::now())
    }

    pub fn dismiss_toast(&self, id: u64) -> bool {
        lock(&self.toasts).dismiss(id)
    }
}

impl Drop for MonitorService {
    fn drop(&mut self) {
        self.alert_listener.abort();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Feeds the alerts of each newest sample into the toast center.
///
/// The watch channel coalesces bursts, so only the newest sample of a burst is
/// offered; alerts carried solely by skipped samples never become toasts.
fn spawn_alert_listener(
    mut samples: watch::Receiver<Arc<[TelemetrySample]>>,
    toasts: Arc<Mutex<ToastCenter>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while samples.changed().await.is_ok() {
            let latest = samples.borrow_and_update().last().cloned();
            let Some(latest) = latest else {
                continue;
            };
            if latest.alerts.is_empty() {
                continue;
            }

            let raised = lock(&toasts).offer(&latest.alerts, Instant::now());
            if let Some(toast) = raised {
                tracing::info!(
                    machine_id = %latest.machine_id,
                    severity = ?toast.severity,
                    title = %toast.title,
                    sticky = toast.requires_dismissal(),
                    "raised alert toast"
                );
            }
        }
    })
}

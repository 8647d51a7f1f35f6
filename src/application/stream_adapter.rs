// Live telemetry stream adapter - One machine feed into a rolling buffer
use crate::application::field_mapping::map_frame;
use crate::application::rolling_buffer::RollingBuffer;
use crate::application::telemetry_source::{TelemetryConnection, TelemetrySource};
use crate::domain::telemetry::TelemetrySample;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Consecutive failed attempts tolerated after the first one.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `attempt`, counting from 1.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31) as i32;
        let scaled = self.initial_delay.as_secs_f64() * self.multiplier.max(1.0).powi(exponent);
        Duration::from_secs_f64(scaled.min(self.max_delay.as_secs_f64()))
    }
}

#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub capacity: usize,
    pub retry: RetryPolicy,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            capacity: 30,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DesiredState {
    Playing,
    Paused,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum StreamPhase {
    Idle,
    Connecting,
    Streaming,
    Closing,
    Reconnecting { delay_ms: u64 },
    /// Retries exhausted; waits for an explicit reconnect.
    Disconnected,
}

/// Status of the adapter's live link.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamConnection {
    pub machine_id: Option<String>,
    pub desired: DesiredState,
    pub phase: StreamPhase,
    pub attempt: u32,
    pub retryable: bool,
    pub buffered: usize,
    pub last_sample_at: Option<DateTime<Utc>>,
}

impl Default for StreamConnection {
    fn default() -> Self {
        Self {
            machine_id: None,
            desired: DesiredState::Paused,
            phase: StreamPhase::Idle,
            attempt: 0,
            retryable: true,
            buffered: 0,
            last_sample_at: None,
        }
    }
}

struct Slot {
    generation: u64,
    buffer: RollingBuffer<TelemetrySample>,
}

/// State shared between the adapter and its connection worker.
///
/// Every mutation coming from a worker carries the worker's generation and is
/// ignored once the adapter has moved on to a newer one.
#[derive(Clone)]
struct StreamShared {
    slot: Arc<Mutex<Slot>>,
    samples: Arc<watch::Sender<Arc<[TelemetrySample]>>>,
    status: Arc<watch::Sender<StreamConnection>>,
}

impl StreamShared {
    fn new(capacity: usize) -> Self {
        let buffer = RollingBuffer::new(capacity);
        let (samples, _) = watch::channel(buffer.snapshot());
        let (status, _) = watch::channel(StreamConnection::default());
        Self {
            slot: Arc::new(Mutex::new(Slot {
                generation: 0,
                buffer,
            })),
            samples: Arc::new(samples),
            status: Arc::new(status),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Invalidate every in-flight connection and return the new generation.
    fn advance(&self, clear: bool) -> u64 {
        let mut slot = self.lock();
        slot.generation += 1;
        if clear && !slot.buffer.is_empty() {
            slot.buffer.clear();
            self.samples.send_replace(slot.buffer.snapshot());
            self.status.send_modify(|status| status.buffered = 0);
        }
        slot.generation
    }

    fn push(&self, generation: u64, sample: TelemetrySample) -> bool {
        let mut slot = self.lock();
        if slot.generation != generation {
            return false;
        }
        let captured_at = sample.captured_at;
        slot.buffer.push(sample);
        let buffered = slot.buffer.len();
        self.status.send_modify(|status| {
            status.buffered = buffered;
            status.last_sample_at = Some(captured_at);
        });
        self.samples.send_replace(slot.buffer.snapshot());
        true
    }

    fn set_phase(&self, generation: u64, phase: StreamPhase, attempt: u32) -> bool {
        let slot = self.lock();
        if slot.generation != generation {
            return false;
        }
        self.status.send_modify(|status| {
            status.retryable = phase != StreamPhase::Disconnected;
            status.phase = phase;
            status.attempt = attempt;
        });
        drop(slot);
        true
    }
}

struct Worker {
    /// Carries the generation that requested the shutdown.
    shutdown: watch::Sender<Option<u64>>,
    handle: JoinHandle<()>,
}

/// Owns at most one live connection for one machine at a time.
pub struct StreamAdapter {
    source: Arc<dyn TelemetrySource>,
    settings: StreamSettings,
    shared: StreamShared,
    worker: Option<Worker>,
    machine_id: Option<String>,
    desired: DesiredState,
}

impl StreamAdapter {
    pub fn new(source: Arc<dyn TelemetrySource>, settings: StreamSettings) -> Self {
        let shared = StreamShared::new(settings.capacity);
        Self {
            source,
            settings,
            shared,
            worker: None,
            machine_id: None,
            desired: DesiredState::Paused,
        }
    }

    /// Point the adapter at `machine_id`. A different machine drops the old
    /// connection and buffer before anything new is opened.
    pub fn set_target(&mut self, machine_id: &str, playing: bool) {
        if self.machine_id.as_deref() != Some(machine_id) {
            self.halt();
            self.shared.advance(true);
            self.machine_id = Some(machine_id.to_string());
            self.shared.status.send_modify(|status| {
                *status = StreamConnection {
                    machine_id: Some(machine_id.to_string()),
                    desired: status.desired,
                    ..StreamConnection::default()
                };
            });
            tracing::info!(machine_id, "telemetry target changed");
        }
        self.set_playing(playing);
    }

    /// Pausing closes the transport but keeps the buffer.
    pub fn set_playing(&mut self, playing: bool) {
        let desired = if playing {
            DesiredState::Playing
        } else {
            DesiredState::Paused
        };
        self.desired = desired;
        self.shared
            .status
            .send_modify(|status| status.desired = desired);

        if playing {
            self.ensure_running();
        } else {
            self.halt();
        }
    }

    /// Start over after the retry budget ran out. Returns whether a new
    /// connection attempt was started.
    pub fn reconnect(&mut self) -> bool {
        if self.desired != DesiredState::Playing || self.is_running() {
            return false;
        }
        self.ensure_running();
        true
    }

    /// Close everything and forget the target.
    pub fn stop(&mut self) {
        self.halt();
        self.shared.advance(true);
        self.machine_id = None;
        self.desired = DesiredState::Paused;
        self.shared.status.send_replace(StreamConnection::default());
    }

    pub fn machine_id(&self) -> Option<&str> {
        self.machine_id.as_deref()
    }

    pub fn snapshot(&self) -> Arc<[TelemetrySample]> {
        self.shared.samples.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<[TelemetrySample]>> {
        self.shared.samples.subscribe()
    }

    pub fn status(&self) -> StreamConnection {
        self.shared.status.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<StreamConnection> {
        self.shared.status.subscribe()
    }

    fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| !worker.handle.is_finished())
    }

    fn ensure_running(&mut self) {
        let Some(machine_id) = self.machine_id.clone() else {
            return;
        };
        if self.is_running() {
            return;
        }

        let generation = self.shared.advance(false);
        self.shared
            .set_phase(generation, StreamPhase::Connecting, 0);
        let (shutdown, shutdown_rx) = watch::channel(None);
        let handle = tokio::spawn(run_connection(
            self.source.clone(),
            machine_id,
            generation,
            self.settings.retry.clone(),
            self.shared.clone(),
            shutdown_rx,
        ));
        self.worker = Some(Worker { shutdown, handle });
    }

    fn halt(&mut self) {
        if let Some(worker) = self.worker.take() {
            let generation = self.shared.advance(false);
            if worker.handle.is_finished() {
                self.shared.set_phase(generation, StreamPhase::Idle, 0);
            } else {
                self.shared.set_phase(generation, StreamPhase::Closing, 0);
                let _ = worker.shutdown.send(Some(generation));
            }
        }
    }
}

impl Drop for StreamAdapter {
    fn drop(&mut self) {
        self.halt();
    }
}

enum PumpExit {
    Shutdown,
    Stale,
    Ended { reason: String, delivered: bool },
}

async fn run_connection(
    source: Arc<dyn TelemetrySource>,
    machine_id: String,
    generation: u64,
    retry: RetryPolicy,
    shared: StreamShared,
    mut shutdown: watch::Receiver<Option<u64>>,
) {
    let mut failures: u32 = 0;

    loop {
        if !shared.set_phase(generation, StreamPhase::Connecting, failures) {
            return settle_stale(&shared, &mut shutdown).await;
        }

        let connected = tokio::select! {
            _ = shutdown.changed() => return finish_closing(&shared, &shutdown),
            result = source.connect(&machine_id) => result,
        };

        match connected {
            Ok(mut connection) => {
                if !shared.set_phase(generation, StreamPhase::Streaming, 0) {
                    connection.close().await;
                    return settle_stale(&shared, &mut shutdown).await;
                }
                tracing::info!(machine_id = %machine_id, "telemetry stream open");

                let exit = pump(
                    connection.as_mut(),
                    &machine_id,
                    generation,
                    &shared,
                    &mut shutdown,
                )
                .await;

                match exit {
                    PumpExit::Shutdown => {
                        connection.close().await;
                        tracing::debug!(machine_id = %machine_id, "telemetry stream closed on request");
                        return finish_closing(&shared, &shutdown);
                    }
                    PumpExit::Stale => {
                        connection.close().await;
                        return settle_stale(&shared, &mut shutdown).await;
                    }
                    PumpExit::Ended { reason, delivered } => {
                        tracing::warn!(machine_id = %machine_id, reason = %reason, "telemetry stream dropped");
                        // Only a link that carried data earns a fresh retry budget.
                        if delivered {
                            failures = 0;
                        }
                    }
                }
            }
            Err(err) => {
                tracing::warn!(
                    machine_id = %machine_id,
                    attempt = failures + 1,
                    error = %err,
                    "telemetry connect failed"
                );
            }
        }

        failures += 1;
        if failures > retry.max_attempts {
            tracing::error!(
                machine_id = %machine_id,
                attempts = failures,
                "telemetry stream disconnected, retries exhausted"
            );
            shared.set_phase(generation, StreamPhase::Disconnected, failures);
            return;
        }

        let delay = retry.delay_for(failures);
        let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        if !shared.set_phase(generation, StreamPhase::Reconnecting { delay_ms }, failures) {
            return settle_stale(&shared, &mut shutdown).await;
        }

        tokio::select! {
            _ = shutdown.changed() => return finish_closing(&shared, &shutdown),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

async fn pump(
    connection: &mut dyn TelemetryConnection,
    machine_id: &str,
    generation: u64,
    shared: &StreamShared,
    shutdown: &mut watch::Receiver<Option<u64>>,
) -> PumpExit {
    let mut delivered = false;
    loop {
        let frame = tokio::select! {
            _ = shutdown.changed() => return PumpExit::Shutdown,
            frame = connection.next_frame() => frame,
        };

        match frame {
            Some(Ok(text)) => match map_frame(machine_id, &text) {
                Ok(sample) => {
                    if !shared.push(generation, sample) {
                        return PumpExit::Stale;
                    }
                    delivered = true;
                }
                Err(err) => {
                    tracing::warn!(machine_id, error = %err, "dropping telemetry frame");
                }
            },
            Some(Err(err)) => {
                return PumpExit::Ended {
                    reason: err.to_string(),
                    delivered,
                };
            }
            None => {
                return PumpExit::Ended {
                    reason: "closed by peer".to_string(),
                    delivered,
                };
            }
        }
    }
}

fn finish_closing(shared: &StreamShared, shutdown: &watch::Receiver<Option<u64>>) {
    let requested_by = *shutdown.borrow();
    if let Some(generation) = requested_by {
        shared.set_phase(generation, StreamPhase::Idle, 0);
    }
}

/// A worker only goes stale after `halt` advanced the generation, and `halt`
/// sends the shutdown right after. Wait for it so `Closing` still ends in `Idle`.
async fn settle_stale(shared: &StreamShared, shutdown: &mut watch::Receiver<Option<u64>>) {
    let requested_by = shutdown.wait_for(Option::is_some).await.map(|value| *value);
    if let Ok(Some(generation)) = requested_by {
        shared.set_phase(generation, StreamPhase::Idle, 0);
    }
}

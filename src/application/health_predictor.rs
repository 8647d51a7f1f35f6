// Health prediction seam
use crate::application::machine_backend::{BackendError, MachineBackend};
use crate::domain::health::HealthSnapshot;
use crate::domain::telemetry::TelemetrySample;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait HealthPredictor: Send + Sync {
    async fn predict(&self, sample: &TelemetrySample) -> Result<HealthSnapshot, BackendError>;
}

/// Uses the predictions the backend already streams with each sample.
#[derive(Debug, Default, Clone)]
pub struct StreamedHealthPredictor;

#[async_trait]
impl HealthPredictor for StreamedHealthPredictor {
    async fn predict(&self, sample: &TelemetrySample) -> Result<HealthSnapshot, BackendError> {
        match (
            sample.anomaly_score,
            sample.failure_probability,
            sample.remaining_useful_life_hours,
        ) {
            (Some(anomaly_score), Some(failure_probability), Some(rul_hours)) => {
                Ok(HealthSnapshot {
                    anomaly_score,
                    failure_probability,
                    rul_hours,
                    component_health: Default::default(),
                    alerts: sample.alerts.clone(),
                })
            }
            _ => Err(BackendError::Unavailable(format!(
                "sample from {} carries no predictions",
                sample.machine_id
            ))),
        }
    }
}

/// Asks the backend's health endpoint.
#[derive(Clone)]
pub struct RemoteHealthPredictor {
    backend: Arc<dyn MachineBackend>,
}

impl RemoteHealthPredictor {
    pub fn new(backend: Arc<dyn MachineBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl HealthPredictor for RemoteHealthPredictor {
    async fn predict(&self, _sample: &TelemetrySample) -> Result<HealthSnapshot, BackendError> {
        self.backend.health().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::field_mapping::map_frame;

    #[tokio::test]
    async fn test_streamed_predictor_reads_sample_fields() {
        let sample = map_frame(
            "robot_01",
            r#"{"anomaly_score": 0.3, "failure_probability": 0.2, "rul_hours": 310.0,
                "alerts": [{"type": "warning", "title": "Potential Anomaly", "message": "Elevated anomaly score: 0.30"}]}"#,
        )
        .unwrap();

        let snapshot = StreamedHealthPredictor.predict(&sample).await.unwrap();
        assert_eq!(snapshot.anomaly_score, 0.3);
        assert_eq!(snapshot.rul_hours, 310.0);
        assert_eq!(snapshot.alerts.len(), 1);
    }

    #[tokio::test]
    async fn test_streamed_predictor_without_fields() {
        let sample = map_frame("robot_01", r#"{"temperature_core": 40.0}"#).unwrap();
        let result = StreamedHealthPredictor.predict(&sample).await;
        assert!(matches!(result, Err(BackendError::Unavailable(_))));
    }
}

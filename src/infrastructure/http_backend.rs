// HTTP implementation of the machine backend
use crate::application::machine_backend::{BackendError, MachineBackend};
use crate::domain::health::{ControlCommand, ControlResponse, Explanation, HealthSnapshot, LogEntry};
use crate::domain::machine::Machine;
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HttpMachineBackend {
    base_url: String,
    client: reqwest::Client,
}

impl HttpMachineBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status { status, body });
        }
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, BackendError> {
        let response = self
            .client
            .get(self.url(path))
            .header("Accept", "application/json")
            .send()
            .await?;

        Ok(Self::ensure_success(response).await?.json::<T>().await?)
    }

    async fn post_json<B, T>(&self, path: &str, body: Option<&B>) -> Result<T, BackendError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut request = self
            .client
            .post(self.url(path))
            .header("Accept", "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        Ok(Self::ensure_success(response).await?.json::<T>().await?)
    }
}

#[async_trait]
impl MachineBackend for HttpMachineBackend {
    async fn list_machines(&self) -> Result<Vec<Machine>, BackendError> {
        self.get_json("/machines").await
    }

    async fn health(&self) -> Result<HealthSnapshot, BackendError> {
        self.get_json("/machine/health").await
    }

    async fn logs(&self) -> Result<Vec<LogEntry>, BackendError> {
        self.get_json("/logs").await
    }

    async fn export_logs(
        &self,
        start_time: Option<f64>,
        end_time: Option<f64>,
    ) -> Result<String, BackendError> {
        let bounds: Vec<String> = [("start_time", start_time), ("end_time", end_time)]
            .into_iter()
            .filter_map(|(name, value)| value.map(|v| format!("{name}={v}")))
            .collect();
        let path = if bounds.is_empty() {
            "/logs/export".to_string()
        } else {
            format!("/logs/export?{}", bounds.join("&"))
        };

        tracing::debug!(path = %path, "exporting sensor logs");
        let response = self.client.get(self.url(&path)).send().await?;
        Ok(Self::ensure_success(response).await?.text().await?)
    }

    async fn sensor_history(&self) -> Result<Vec<serde_json::Value>, BackendError> {
        self.get_json("/sensor-data").await
    }

    async fn activate_scenario(&self, scenario_id: &str) -> Result<serde_json::Value, BackendError> {
        let path = format!("/scenarios/{}/activate", urlencoding::encode(scenario_id));
        self.post_json::<(), _>(&path, None).await
    }

    async fn set_failure_mode(
        &self,
        mode_id: &str,
        active: bool,
    ) -> Result<serde_json::Value, BackendError> {
        let action = if active { "activate" } else { "deactivate" };
        let path = format!("/failure-modes/{}/{}", urlencoding::encode(mode_id), action);
        self.post_json::<(), _>(&path, None).await
    }

    async fn control(&self, command: &ControlCommand) -> Result<ControlResponse, BackendError> {
        self.post_json("/machine/control", Some(command)).await
    }

    async fn explain_failure(
        &self,
        features: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Explanation, BackendError> {
        self.post_json("/explain/failure", Some(features)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, RawQuery};
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{Value, json};

    async fn spawn_backend() -> HttpMachineBackend {
        let router = Router::new()
            .route(
                "/machines",
                get(|| async { Json(json!([{ "id": "armpi_fpv_01", "type": "robotic_arm" }])) }),
            )
            .route(
                "/machine/health",
                get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "Simulator not initialized") }),
            )
            .route(
                "/logs/export",
                get(|RawQuery(query): RawQuery| async move {
                    format!("timestamp,temperature_core\n# {}", query.unwrap_or_default())
                }),
            )
            .route(
                "/failure-modes/:id/:action",
                post(|Path((id, action)): Path<(String, String)>| async move {
                    Json(json!({ "id": id, "action": action }))
                }),
            )
            .route(
                "/machine/control",
                post(|Json(command): Json<Value>| async move {
                    Json(json!({
                        "success": true,
                        "message": format!("Injected {} fault", command["parameters"]["type"].as_str().unwrap_or("?")),
                        "timestamp": 1700000000.0
                    }))
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        HttpMachineBackend::new(&format!("http://{addr}/"), Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn test_list_machines() {
        let backend = spawn_backend().await;
        let machines = backend.list_machines().await.unwrap();
        assert_eq!(machines.len(), 1);
        assert_eq!(machines[0].machine_type, "robotic_arm");
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let backend = spawn_backend().await;
        match backend.health().await {
            Err(BackendError::Status { status, body }) => {
                assert_eq!(status, 503);
                assert_eq!(body, "Simulator not initialized");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_export_passes_time_bounds() {
        let backend = spawn_backend().await;
        let csv = backend.export_logs(Some(10.5), None).await.unwrap();
        assert!(csv.starts_with("timestamp,temperature_core"));
        assert!(csv.ends_with("start_time=10.5"));
    }

    #[tokio::test]
    async fn test_failure_mode_and_control() {
        let backend = spawn_backend().await;

        let toggled = backend.set_failure_mode("bearing wear", false).await.unwrap();
        assert_eq!(toggled["id"], "bearing wear");
        assert_eq!(toggled["action"], "deactivate");

        let mut parameters = serde_json::Map::new();
        parameters.insert("type".to_string(), json!("temperature"));
        let response = backend
            .control(&ControlCommand {
                command: "inject_fault".to_string(),
                parameters: Some(parameters),
            })
            .await
            .unwrap();
        assert!(response.success);
        assert_eq!(response.message, "Injected temperature fault");
    }

    #[tokio::test]
    async fn test_unreachable_backend() {
        let backend = HttpMachineBackend::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        assert!(matches!(
            backend.list_machines().await,
            Err(BackendError::Request(_))
        ));
    }
}

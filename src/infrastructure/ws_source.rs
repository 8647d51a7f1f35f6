// WebSocket telemetry source
use crate::application::telemetry_source::{StreamError, TelemetryConnection, TelemetrySource};
use crate::infrastructure::config::prepare_template;
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::HashMap;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

#[derive(Debug, Clone)]
pub struct WsTelemetrySource {
    ws_base: String,
    stream_path: String,
}

impl WsTelemetrySource {
    pub fn new(ws_base: &str, stream_path: &str) -> Self {
        Self {
            ws_base: ws_base.trim_end_matches('/').to_string(),
            stream_path: stream_path.to_string(),
        }
    }

    pub fn stream_url(&self, machine_id: &str) -> String {
        let mut vars = HashMap::new();
        vars.insert(
            "machine_id".to_string(),
            urlencoding::encode(machine_id).into_owned(),
        );
        format!("{}{}", self.ws_base, prepare_template(&self.stream_path, &vars))
    }
}

#[async_trait]
impl TelemetrySource for WsTelemetrySource {
    async fn connect(&self, machine_id: &str) -> Result<Box<dyn TelemetryConnection>, StreamError> {
        let url = self.stream_url(machine_id);
        tracing::debug!(url = %url, "opening telemetry socket");

        let (socket, _response) =
            connect_async(url.as_str())
                .await
                .map_err(|e| StreamError::Connect {
                    url: url.clone(),
                    reason: e.to_string(),
                })?;

        Ok(Box::new(WsConnection { socket }))
    }
}

struct WsConnection {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl TelemetryConnection for WsConnection {
    async fn next_frame(&mut self) -> Option<Result<String, StreamError>> {
        loop {
            match self.socket.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                    Ok(text) => return Some(Ok(text)),
                    Err(_) => tracing::warn!("dropping non-UTF-8 binary frame"),
                },
                Ok(Message::Close(_)) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(StreamError::Transport(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.socket.close(None).await {
            tracing::debug!(error = %e, "telemetry socket close failed");
        }
    }
}

// Transport seam for live telemetry
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },
    #[error("transport error: {0}")]
    Transport(String),
}

/// One open link to a machine's telemetry feed.
#[async_trait]
pub trait TelemetryConnection: Send {
    /// Next text frame. `None` once the peer has closed the link.
    ///
    /// Must be safe to cancel; the adapter races it against its shutdown signal.
    async fn next_frame(&mut self) -> Option<Result<String, StreamError>>;

    /// Close the link on our side.
    async fn close(&mut self);
}

#[async_trait]
pub trait TelemetrySource: Send + Sync {
    async fn connect(&self, machine_id: &str) -> Result<Box<dyn TelemetryConnection>, StreamError>;
}

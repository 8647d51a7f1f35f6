// Toast notification domain model
use super::telemetry::Severity;
use serde::Serialize;
use std::time::Instant;

#[derive(Debug, Clone, Serialize)]
pub struct ToastAlert {
    pub id: u64,
    pub severity: Severity,
    pub title: String,
    pub message: String,
    /// `None` means the toast stays until dismissed.
    #[serde(skip)]
    pub expires_at: Option<Instant>,
}

impl ToastAlert {
    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }

    pub fn requires_dismissal(&self) -> bool {
        self.expires_at.is_none()
    }
}

// User preference domain model
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub dark_mode: bool,
    pub chart_refresh_rate_ms: u64,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            dark_mode: true,
            chart_refresh_rate_ms: 5000,
        }
    }
}

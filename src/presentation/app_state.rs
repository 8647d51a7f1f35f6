// Application state for HTTP handlers
use crate::application::monitor_service::MonitorService;
use crate::infrastructure::preferences_store::PreferenceStore;

pub struct AppState {
    pub monitor: MonitorService,
    pub preferences: PreferenceStore,
}

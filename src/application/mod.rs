// Application layer - Use cases and the seams to external collaborators
pub mod field_mapping;
pub mod health_predictor;
pub mod machine_backend;
pub mod monitor_service;
pub mod rolling_buffer;
pub mod stream_adapter;
pub mod telemetry_source;
pub mod toast_center;
pub mod window_selector;

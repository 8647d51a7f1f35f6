// Domain layer - Plain data types with no I/O
pub mod health;
pub mod machine;
pub mod preferences;
pub mod telemetry;
pub mod toast;
pub mod window;

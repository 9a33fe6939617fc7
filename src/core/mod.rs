pub mod config;
pub mod metrics;
pub mod shutdown;
pub mod state;
pub mod telemetry;
pub mod time;

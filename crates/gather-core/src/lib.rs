pub mod config;
pub mod models;
pub mod orchestration;
pub(crate) mod task_context;
pub mod telemetry;

//! Logging setup and health reporting for the analytics pipeline.

pub mod health;
pub mod logging;

pub use health::{health, PipelineHealth, ServiceStatus, Stage};
pub use logging::init_logging;

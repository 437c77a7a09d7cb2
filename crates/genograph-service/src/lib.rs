#![forbid(unsafe_code)]

pub const CRATE_NAME: &str = "genograph-service";

mod config;
mod error;
mod lifecycle;
mod orchestrator;
mod rows;

pub use config::{validate_service_config, ServiceConfig};
pub use error::ServiceError;
pub use lifecycle::{LifecycleMetrics, LifecycleMetricsSnapshot, ProjectionLifecycle};
pub use orchestrator::{Analysis, AnalysisRequest, AnalysisService};

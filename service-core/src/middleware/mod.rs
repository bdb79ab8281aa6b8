pub mod metrics;
pub mod tracing;

pub use metrics::{HttpMetricsRecorder, metrics_middleware};
pub use tracing::{REQUEST_ID_HEADER, request_id, request_id_middleware};

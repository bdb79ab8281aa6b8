use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Path label recorded for requests no route matched.
pub const UNMATCHED_PATH: &str = "unmatched";

/// Sink for per-request HTTP measurements. Services hand their own recorder
/// to the middleware instead of writing to a process-wide registry.
pub trait HttpMetricsRecorder: Send + Sync + 'static {
    fn record_request(&self, method: &str, path: &str, status: u16, elapsed: Duration);
}

/// Record method, route template, status and latency of every request.
///
/// Install with `axum::middleware::from_fn_with_state(recorder, metrics_middleware::<R>)`.
pub async fn metrics_middleware<R: HttpMetricsRecorder>(
    State(recorder): State<Arc<R>>,
    req: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    // Route templates keep label cardinality bounded; unrouted paths share one label.
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_PATH.to_string());

    let response = next.run(req).await;

    recorder.record_request(&method, &path, response.status().as_u16(), start.elapsed());

    response
}

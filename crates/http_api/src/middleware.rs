use std::time::Instant;

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use tracing::{debug, warn};

/// Logs method, path, status and latency for every request.
pub async fn log_requests(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();
    let response = next.run(req).await;
    let status = response.status();
    let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    if status.is_client_error() {
        warn!(%method, path = %path, status = status.as_u16(), elapsed_ms, "request rejected");
    } else {
        debug!(%method, path = %path, status = status.as_u16(), elapsed_ms, "request handled");
    }
    response
}

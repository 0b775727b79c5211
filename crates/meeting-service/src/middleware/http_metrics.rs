//! HTTP metrics middleware.
//!
//! Records every response, including ones produced before a handler runs:
//! - 404 Not Found (unknown route)
//! - 405 Method Not Allowed
//! - 408 Request Timeout (from `TimeoutLayer`)

use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

use crate::observability::metrics::record_http_request;

/// Records method, normalized path, status code and duration for each
/// request. Must be the outermost layer.
pub async fn http_metrics_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    record_http_request(&method, &path, response.status().as_u16(), start.elapsed());

    response
}

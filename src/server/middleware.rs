//! Access logging keyed by route template.

use std::time::Instant;

use axum::{
    extract::{MatchedPath, Request},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::{info, info_span, Instrument};

/// Header carrying the correlation id, read from requests and echoed on
/// responses.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Route label for requests no mounted resource matched.
pub const UNMATCHED_ROUTE: &str = "<unmatched>";

/// Caller supplied correlation id, or a fresh v4 uuid.
fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

/// Log every request against the resource template it was dispatched to.
///
/// Logging by template (`/v1/echo/*msg`) rather than raw path keeps one log
/// key per registered resource. The correlation id is echoed back in
/// `X-Request-Id` so callers can find the matching log line.
pub async fn request_logging_middleware(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let id = request_id(request.headers());
    let method = request.method().clone();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string());
    let route = route.as_deref().unwrap_or(UNMATCHED_ROUTE).to_string();

    let span = info_span!(
        "request",
        request_id = %id,
        method = %method,
        route = %route,
        status = tracing::field::Empty,
    );
    let mut response = next.run(request).instrument(span.clone()).await;

    let status = response.status().as_u16();
    span.record("status", status);
    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    info!(
        target: "rest_kit::access",
        request_id = %id,
        method = %method,
        route = %route,
        status,
        latency_ms = started.elapsed().as_millis() as u64,
        "request served"
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, extract::Path, routing::get, Router};
    use tower::ServiceExt;

    fn router() -> Router {
        Router::new()
            .route("/items/:id", get(|Path(id): Path<String>| async move { id }))
            .layer(axum::middleware::from_fn(request_logging_middleware))
    }

    #[test]
    fn test_request_id_from_header() {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static("abc"));
        assert_eq!(request_id(&headers), "abc");
    }

    #[test]
    fn test_request_id_generated() {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static(""));
        let id = request_id(&headers);
        assert!(uuid::Uuid::parse_str(&id).is_ok());
        assert_ne!(request_id(&HeaderMap::new()), id);
    }

    #[tokio::test]
    async fn test_request_id_echoed() {
        let request = axum::http::Request::builder()
            .uri("/items/7")
            .header(REQUEST_ID_HEADER, "trace-7")
            .body(Body::empty())
            .unwrap();
        let response = router().oneshot(request).await.unwrap();
        assert_eq!(response.headers()[REQUEST_ID_HEADER], "trace-7");
    }
}

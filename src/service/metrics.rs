//! Request metrics and the `/metrics` exposition endpoint.
//!
//! ## Metrics Exposed
//!
//! - `http_requests_total` - Counter of requests by route, method, status
//! - `http_request_duration_seconds` - Summary (sum and count) of latency by
//!   route, method, status
//! - `process_uptime_seconds` - Seconds since the metrics were created
//!
//! Routes are labelled by their template (`/v1/echo/*msg`), never by the
//! concrete request path, so label cardinality is bounded by the number of
//! registered resources.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    http::header,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::MethodRouter,
};
use parking_lot::Mutex;

use super::{Handler, Service};
use crate::registry::Resource;

/// Content type of the Prometheus text exposition format.
pub const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct RequestKey {
    route: String,
    method: String,
    status: u16,
}

#[derive(Debug, Clone, Copy, Default)]
struct RequestStats {
    count: u64,
    latency: Duration,
}

/// Process-local request metrics.
#[derive(Debug)]
pub struct HttpMetrics {
    started: Instant,
    requests: Mutex<BTreeMap<RequestKey, RequestStats>>,
}

impl Default for HttpMetrics {
    fn default() -> Self {
        Self {
            started: Instant::now(),
            requests: Mutex::new(BTreeMap::new()),
        }
    }
}

impl HttpMetrics {
    /// Create empty metrics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed request.
    pub fn record(&self, route: &str, method: &str, status: u16, latency: Duration) {
        let key = RequestKey {
            route: route.to_string(),
            method: method.to_string(),
            status,
        };
        let mut requests = self.requests.lock();
        let stats = requests.entry(key).or_default();
        stats.count += 1;
        stats.latency += latency;
    }

    /// Number of requests recorded for a route and method, across statuses.
    pub fn request_count(&self, route: &str, method: &str) -> u64 {
        self.requests
            .lock()
            .iter()
            .filter(|(key, _)| key.route == route && key.method == method)
            .map(|(_, stats)| stats.count)
            .sum()
    }

    /// Render every metric in the Prometheus text format.
    pub fn render(&self) -> String {
        let snapshot: Vec<(RequestKey, RequestStats)> = self
            .requests
            .lock()
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();

        let mut out = String::new();
        out.push_str("# HELP http_requests_total Total number of handled HTTP requests.\n");
        out.push_str("# TYPE http_requests_total counter\n");
        for (key, stats) in &snapshot {
            let _ = writeln!(out, "http_requests_total{{{}}} {}", labels(key), stats.count);
        }

        out.push_str("# HELP http_request_duration_seconds Time spent handling HTTP requests.\n");
        out.push_str("# TYPE http_request_duration_seconds summary\n");
        for (key, stats) in &snapshot {
            let labels = labels(key);
            let _ = writeln!(
                out,
                "http_request_duration_seconds_sum{{{labels}}} {}",
                stats.latency.as_secs_f64()
            );
            let _ = writeln!(
                out,
                "http_request_duration_seconds_count{{{labels}}} {}",
                stats.count
            );
        }

        out.push_str("# HELP process_uptime_seconds Seconds since the server started.\n");
        out.push_str("# TYPE process_uptime_seconds gauge\n");
        let _ = writeln!(
            out,
            "process_uptime_seconds {}",
            self.started.elapsed().as_secs_f64()
        );
        out
    }
}

fn labels(key: &RequestKey) -> String {
    format!(
        "route=\"{}\",method=\"{}\",status=\"{}\"",
        escape_label(&key.route),
        escape_label(&key.method),
        key.status
    )
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

#[derive(Clone)]
struct RouteMetrics {
    metrics: Arc<HttpMetrics>,
    route: Arc<str>,
}

/// Wrap a route so every request it serves is recorded under `route`.
pub fn instrument(metrics: &Arc<HttpMetrics>, route: &str, router: MethodRouter) -> MethodRouter {
    let state = RouteMetrics {
        metrics: Arc::clone(metrics),
        route: Arc::from(route),
    };
    router.route_layer(middleware::from_fn_with_state(state, track))
}

async fn track(State(state): State<RouteMetrics>, request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();

    let response = next.run(request).await;

    state.metrics.record(
        &state.route,
        &method,
        response.status().as_u16(),
        start.elapsed(),
    );
    response
}

/// Serves `GET /metrics` from a shared [`HttpMetrics`].
pub struct MetricsService {
    metrics: Arc<HttpMetrics>,
}

impl MetricsService {
    /// Expose `metrics` on the root group.
    pub fn new(metrics: Arc<HttpMetrics>) -> Self {
        Self { metrics }
    }
}

impl Service for MetricsService {
    fn list_handlers(&self) -> Vec<Handler> {
        let metrics = Arc::clone(&self.metrics);
        vec![Handler::new(
            Resource::new("/metrics", "GET", "/metrics"),
            move || async move {
                (
                    [(header::CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)],
                    metrics.render(),
                )
                    .into_response()
            },
        )]
    }
}

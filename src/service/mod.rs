//! Pluggable services.
//!
//! A [`Service`] hands the server a list of [`Handler`]s, each a [`Resource`]
//! bound to an axum handler. A [`ServiceGroup`] additionally names the API
//! group its handlers are mounted under; plain services mount at the root.
//!
//! ## Built-in services
//!
//! - [`DiscoveryService`] - `GET /apis`, `GET /apis/`, `GET /apis/:group`
//! - [`MetricsService`] - `GET /metrics`
//! - [`ProfilingService`] - `GET /debug/pprof`, `/debug/pprof/cmdline`,
//!   `/debug/pprof/profile`

pub mod discovery;
pub mod metrics;
pub mod profiling;

use std::convert::Infallible;
use std::fmt;

use axum::{
    extract::Request,
    handler::Handler as AxumHandler,
    response::Response,
};
use tower::util::BoxCloneService;

use crate::registry::Resource;

pub use discovery::DiscoveryService;
pub use metrics::{instrument, HttpMetrics, MetricsService};
pub use profiling::ProfilingService;

/// Type-erased request handler.
pub type BoxedHandler = BoxCloneService<Request, Response, Infallible>;

/// A resource bound to the code that serves it.
pub struct Handler {
    /// What is mounted, and where.
    pub resource: Resource,
    /// How requests to it are answered.
    pub service: BoxedHandler,
}

impl Handler {
    /// Bind any axum handler to a resource.
    pub fn new<H, T>(resource: Resource, handler: H) -> Self
    where
        H: AxumHandler<T, ()>,
        T: 'static,
    {
        Self {
            resource,
            service: BoxCloneService::new(handler.with_state(())),
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("resource", &self.resource)
            .finish_non_exhaustive()
    }
}

/// A module that contributes handlers to a server.
///
/// `list_handlers` is called once, when the service is registered.
pub trait Service: Send + Sync {
    /// Every handler this service exposes.
    fn list_handlers(&self) -> Vec<Handler>;
}

/// A service mounted under its own API group, e.g. `"/v1"`.
pub trait ServiceGroup: Service {
    /// Group prefix for this service's handlers.
    fn api_group(&self) -> &str;
}

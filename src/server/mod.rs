//! Server façade.
//!
//! The [`Server`] owns the configuration, the axum router and the service
//! registry. Services are registered while the server is being assembled;
//! [`Server::run`] then mounts the built-in services, binds the configured
//! address and serves until a [`ShutdownHandle`] asks it to stop.
//!
//! ```text
//! Configured -> Registering -> Serving -> ShuttingDown -> Stopped
//! ```
//!
//! Registration needs `&mut Server` and serving consumes it, so every
//! registration happens-before the first request is served.

pub mod middleware;
pub mod signal;

use std::collections::HashSet;
use std::future::IntoFuture;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::Method,
    routing::{self, MethodFilter, MethodRouter},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::path::{self, PathError};
use crate::registry::{
    canonical_group, mount_prefix, Resource, ServiceRegistry, SharedRegistry, ROOT_GROUP,
};
use crate::service::{
    instrument, BoxedHandler, DiscoveryService, Handler, HttpMetrics, MetricsService,
    ProfilingService, Service, ServiceGroup,
};

/// How a server left the serving state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Every in-flight request finished within the grace period.
    Drained,
    /// The grace period ran out and open connections were dropped.
    TimedOut,
    /// Startup or the transport failed.
    Failed,
}

/// Lifecycle of a [`Server`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Constructed, nothing registered yet.
    Configured,
    /// At least one service registered.
    Registering,
    /// Accepting connections.
    Serving,
    /// Draining in-flight requests.
    ShuttingDown,
    /// Done.
    Stopped(StopReason),
}

/// Errors raised while registering a service.
#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    /// A resource path could not be normalized or mounted.
    #[error("invalid path for resource {name}: {source}")]
    InvalidPath {
        name: String,
        #[source]
        source: PathError,
    },

    /// A resource method is not a valid HTTP method.
    #[error("invalid HTTP method {method:?} for resource {name}")]
    InvalidMethod { name: String, method: String },

    /// A resource method is valid but the router cannot dispatch on it.
    #[error("HTTP method {method} cannot be routed (resource {name})")]
    UnsupportedMethod { name: String, method: String },

    /// The same method and path were registered twice.
    #[error("{method} {path} is already registered")]
    Conflict { method: String, path: String },

    /// A route template would shadow, or be shadowed by, a mounted one.
    #[error("{path} overlaps the already registered route {existing}")]
    Overlap { path: String, existing: String },

    /// A group name cannot be served as a single discovery segment.
    #[error("invalid API group {group:?}: {reason}")]
    InvalidGroup { group: String, reason: &'static str },
}

/// Errors that stop a server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// A built-in service could not be registered.
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    /// The listen address could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// The transport failed while serving.
    #[error("server error: {0}")]
    Serve(#[source] io::Error),

    /// In-flight requests outlived the grace period.
    #[error("in-flight requests did not finish within {0:?}, connections were closed")]
    ShutdownTimeout(Duration),
}

/// A handler checked and ready to be mounted.
struct PlannedRoute {
    resource: Resource,
    full_path: String,
    method: Method,
    filter: MethodFilter,
    service: BoxedHandler,
}

fn plan_route(prefix: &str, handler: Handler) -> Result<PlannedRoute, RegistrationError> {
    let Handler { resource, service } = handler;

    let path = path::normalize(&resource.path);
    let full_path = path::join(prefix, &path);
    path::validate_template(&full_path).map_err(|source| RegistrationError::InvalidPath {
        name: resource.name.clone(),
        source,
    })?;

    let method_name = resource.method.trim().to_ascii_uppercase();
    let method = Method::from_bytes(method_name.as_bytes()).map_err(|_| {
        RegistrationError::InvalidMethod {
            name: resource.name.clone(),
            method: resource.method.clone(),
        }
    })?;
    let filter = MethodFilter::try_from(method.clone()).map_err(|_| {
        RegistrationError::UnsupportedMethod {
            name: resource.name.clone(),
            method: method_name.clone(),
        }
    })?;

    Ok(PlannedRoute {
        resource: Resource {
            name: resource.name,
            path,
            method: method_name,
        },
        full_path,
        method,
        filter,
        service,
    })
}

/// Groups are one path segment, so `/apis/:group` can serve every one of them.
fn check_group(group: &str) -> Result<(), RegistrationError> {
    if group == ROOT_GROUP {
        return Ok(());
    }
    let reason = if group.contains(path::SEPARATOR) {
        "a group name is a single path segment"
    } else if group.starts_with([':', '*']) {
        "a group name cannot be a route parameter"
    } else {
        return Ok(());
    };
    Err(RegistrationError::InvalidGroup {
        group: group.to_string(),
        reason,
    })
}

/// Insert `full_path` into the route table the router dispatches with.
///
/// axum panics on overlapping templates; the same table turns that into an
/// error before anything is mounted.
fn claim_route(
    routes: &mut matchit::Router<()>,
    name: &str,
    full_path: &str,
) -> Result<(), RegistrationError> {
    match routes.insert(full_path, ()) {
        Ok(()) => Ok(()),
        Err(matchit::InsertError::Conflict { with }) => Err(RegistrationError::Overlap {
            path: full_path.to_string(),
            existing: with,
        }),
        Err(e) => {
            debug!(path = %full_path, error = %e, "route table rejected template");
            Err(RegistrationError::InvalidPath {
                name: name.to_string(),
                source: PathError::InvalidTemplate {
                    path: full_path.to_string(),
                    reason: "rejected by the router",
                },
            })
        }
    }
}

/// Resolve once the lifecycle satisfies `done`, returning that state.
///
/// Returns `None` if every sender is gone.
async fn wait_until(
    mut rx: watch::Receiver<Lifecycle>,
    done: fn(&Lifecycle) -> bool,
) -> Option<Lifecycle> {
    loop {
        let current = *rx.borrow_and_update();
        if done(&current) {
            return Some(current);
        }
        if rx.changed().await.is_err() {
            return None;
        }
    }
}

fn is_shutting_down(state: &Lifecycle) -> bool {
    matches!(state, Lifecycle::ShuttingDown | Lifecycle::Stopped(_))
}

fn is_stopped(state: &Lifecycle) -> bool {
    matches!(state, Lifecycle::Stopped(_))
}

/// HTTP server with a service registry.
pub struct Server {
    config: Config,
    router: Router,
    registry: SharedRegistry,
    mounted: HashSet<(String, String)>,
    routes: matchit::Router<()>,
    paths: HashSet<String>,
    metrics: Option<Arc<HttpMetrics>>,
    lifecycle: Arc<watch::Sender<Lifecycle>>,
}

impl Server {
    /// Create a server with an empty registry.
    pub fn new(config: Config) -> Self {
        let metrics = config.enable_metrics.then(|| Arc::new(HttpMetrics::new()));
        let (lifecycle, _) = watch::channel(Lifecycle::Configured);
        Self {
            config,
            router: Router::new(),
            registry: ServiceRegistry::shared(),
            mounted: HashSet::new(),
            routes: matchit::Router::new(),
            paths: HashSet::new(),
            metrics,
            lifecycle: Arc::new(lifecycle),
        }
    }

    /// The configuration this server was built with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The registry discovery answers from.
    pub fn registry(&self) -> SharedRegistry {
        Arc::clone(&self.registry)
    }

    /// Request metrics, when enabled.
    pub fn metrics(&self) -> Option<Arc<HttpMetrics>> {
        self.metrics.clone()
    }

    /// Current lifecycle state.
    pub fn lifecycle(&self) -> Lifecycle {
        *self.lifecycle.borrow()
    }

    /// A handle that can stop this server once it is serving.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            lifecycle: Arc::clone(&self.lifecycle),
            grace: self.config.grace_shutdown_timeout,
        }
    }

    /// Mount an ungrouped service at the root group.
    pub fn register_service<S>(&mut self, service: &S) -> Result<(), RegistrationError>
    where
        S: Service + ?Sized,
    {
        self.mount(ROOT_GROUP, service.list_handlers())
    }

    /// Mount a service under the group it declares.
    pub fn register_service_group<G>(&mut self, service: &G) -> Result<(), RegistrationError>
    where
        G: ServiceGroup + ?Sized,
    {
        self.mount(service.api_group(), service.list_handlers())
    }

    /// Validate every handler, then mount them all.
    ///
    /// Nothing is mounted if any handler is rejected.
    fn mount(&mut self, group: &str, handlers: Vec<Handler>) -> Result<(), RegistrationError> {
        self.lifecycle.send_if_modified(|state| {
            if *state == Lifecycle::Configured {
                *state = Lifecycle::Registering;
                true
            } else {
                false
            }
        });

        let group = canonical_group(group);
        check_group(&group)?;
        let prefix = mount_prefix(&group);

        let mut planned = Vec::with_capacity(handlers.len());
        let mut pending = HashSet::new();
        let mut routes = self.routes.clone();
        let mut new_paths = HashSet::new();
        for handler in handlers {
            let route = plan_route(&prefix, handler)?;
            let key = (route.resource.method.clone(), route.full_path.clone());
            if self.mounted.contains(&key) || !pending.insert(key) {
                return Err(RegistrationError::Conflict {
                    method: route.resource.method,
                    path: route.full_path,
                });
            }
            // Other methods on a known path merge into its method router.
            if !self.paths.contains(&route.full_path) && new_paths.insert(route.full_path.clone()) {
                claim_route(&mut routes, &route.resource.name, &route.full_path)?;
            }
            planned.push(route);
        }
        self.routes = routes;
        self.paths.extend(new_paths);

        let count = planned.len();
        for route in planned {
            let PlannedRoute {
                resource,
                full_path,
                method,
                filter,
                service,
            } = route;

            let mut method_router: MethodRouter = routing::on_service(filter, service);
            if let Some(metrics) = &self.metrics {
                method_router = instrument(metrics, &full_path, method_router);
            }
            self.router = std::mem::take(&mut self.router).route(&full_path, method_router);

            debug!(
                group = %group,
                method = %method,
                path = %full_path,
                resource = %resource.name,
                "mounted resource"
            );
            self.mounted.insert((resource.method.clone(), full_path));
            self.registry.write().add_group_resource(&group, resource);
        }

        info!(group = %group, handlers = count, "service registered");
        Ok(())
    }

    fn register_builtins(&mut self) -> Result<(), RegistrationError> {
        if self.config.enable_debug {
            self.register_service_group(&ProfilingService::new())?;
        }
        if let Some(metrics) = self.metrics.clone() {
            self.register_service(&MetricsService::new(metrics))?;
        }
        if self.config.enable_discovery {
            let discovery = DiscoveryService::new(Arc::clone(&self.registry));
            self.register_service(&discovery)?;
        }
        Ok(())
    }

    fn build(&mut self) -> Result<Router, ServerError> {
        self.register_builtins()?;
        {
            let registry = self.registry.read();
            info!(
                groups = registry.len(),
                resources = registry.resource_count(),
                "service registry ready"
            );
        }
        Ok(std::mem::take(&mut self.router)
            .layer(axum::middleware::from_fn(
                middleware::request_logging_middleware,
            ))
            .layer(TraceLayer::new_for_http()))
    }

    /// Mount the built-in services and return the finished router.
    ///
    /// Useful to drive the server in-process, without a socket. The router is
    /// served elsewhere, so shutdown handles see this server as stopped.
    pub fn into_router(mut self) -> Result<Router, ServerError> {
        self.build()
    }

    /// Stop before serving if a shutdown was already requested.
    fn cancel_if_requested(&self) -> bool {
        self.lifecycle.send_if_modified(|state| {
            if *state == Lifecycle::ShuttingDown {
                *state = Lifecycle::Stopped(StopReason::Drained);
                true
            } else {
                false
            }
        })
    }

    fn stop(&self, reason: StopReason) {
        self.lifecycle.send_replace(Lifecycle::Stopped(reason));
    }

    /// Bind the configured address and serve until shut down.
    pub async fn run(self) -> Result<(), ServerError> {
        if self.cancel_if_requested() {
            info!("shutdown requested before start, not binding");
            return Ok(());
        }

        let listener = match TcpListener::bind(&self.config.bind_addr).await {
            Ok(listener) => listener,
            Err(source) => {
                error!(address = %self.config.bind_addr, error = %source, "failed to bind");
                self.stop(StopReason::Failed);
                return Err(ServerError::Bind {
                    addr: self.config.bind_addr.clone(),
                    source,
                });
            }
        };
        self.serve(listener).await
    }

    /// Serve on an already bound listener until shut down.
    pub async fn serve(mut self, listener: TcpListener) -> Result<(), ServerError> {
        if self.cancel_if_requested() {
            info!("shutdown requested before start, not serving");
            return Ok(());
        }

        let router = match self.build() {
            Ok(router) => router,
            Err(e) => {
                self.stop(StopReason::Failed);
                return Err(e);
            }
        };

        // A shutdown may have been requested while the built-ins were mounted.
        let started = self.lifecycle.send_if_modified(|state| match state {
            Lifecycle::Configured | Lifecycle::Registering => {
                *state = Lifecycle::Serving;
                true
            }
            _ => false,
        });
        if !started && self.cancel_if_requested() {
            return Ok(());
        }

        let grace = self.config.grace_shutdown_timeout;
        match listener.local_addr() {
            Ok(address) => info!(address = %address, "listening"),
            Err(e) => warn!(error = %e, "listening on unknown address"),
        }

        let signal = {
            let rx = self.lifecycle.subscribe();
            async move {
                wait_until(rx, is_shutting_down).await;
            }
        };
        let serving = axum::serve(listener, router)
            .with_graceful_shutdown(signal)
            .into_future();
        tokio::pin!(serving);

        let draining = wait_until(self.lifecycle.subscribe(), is_shutting_down);
        let finished = tokio::select! {
            result = &mut serving => Some(result),
            _ = draining => None,
        };

        let outcome = match finished {
            Some(result) => result.map_err(ServerError::Serve),
            None => {
                info!(grace_secs = grace.as_secs_f64(), "draining in-flight requests");
                match tokio::time::timeout(grace, &mut serving).await {
                    Ok(result) => result.map_err(ServerError::Serve),
                    Err(_) => {
                        error!(
                            grace_secs = grace.as_secs_f64(),
                            "graceful shutdown timed out, closing connections"
                        );
                        Err(ServerError::ShutdownTimeout(grace))
                    }
                }
            }
        };

        let reason = match &outcome {
            Ok(()) => StopReason::Drained,
            Err(ServerError::ShutdownTimeout(_)) => StopReason::TimedOut,
            Err(_) => StopReason::Failed,
        };
        self.stop(reason);
        match &outcome {
            Ok(()) => info!("server shutdown complete"),
            Err(e) => error!(error = %e, "server stopped"),
        }
        outcome
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        // Release handles waiting on a server that never served, or whose
        // serve future was dropped.
        self.lifecycle.send_if_modified(|state| {
            let reason = match state {
                Lifecycle::Stopped(_) => return false,
                Lifecycle::Serving => StopReason::Failed,
                _ => StopReason::Drained,
            };
            debug!(?reason, "server dropped before it stopped");
            *state = Lifecycle::Stopped(reason);
            true
        });
    }
}

/// Cloneable handle that stops a running [`Server`].
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    lifecycle: Arc<watch::Sender<Lifecycle>>,
    grace: Duration,
}

impl ShutdownHandle {
    /// Current lifecycle state of the server.
    pub fn lifecycle(&self) -> Lifecycle {
        *self.lifecycle.borrow()
    }

    /// Ask the server to stop accepting connections, without waiting.
    ///
    /// Returns `false` if a shutdown was already underway or finished.
    pub fn request(&self) -> bool {
        self.lifecycle.send_if_modified(|state| match state {
            Lifecycle::ShuttingDown | Lifecycle::Stopped(_) => false,
            _ => {
                *state = Lifecycle::ShuttingDown;
                true
            }
        })
    }

    /// Wait until the server is serving or has already moved past it.
    pub async fn wait_serving(&self) {
        wait_until(self.lifecycle.subscribe(), |state| {
            !matches!(state, Lifecycle::Configured | Lifecycle::Registering)
        })
        .await;
    }

    /// Stop the server and wait for in-flight requests to drain.
    ///
    /// Fails with [`ServerError::ShutdownTimeout`] when the grace period ran
    /// out and connections had to be closed.
    pub async fn shutdown(&self) -> Result<(), ServerError> {
        if self.request() {
            info!("graceful shutdown requested");
        }
        match wait_until(self.lifecycle.subscribe(), is_stopped).await {
            Some(Lifecycle::Stopped(StopReason::TimedOut)) => {
                Err(ServerError::ShutdownTimeout(self.grace))
            }
            Some(Lifecycle::Stopped(StopReason::Failed)) => Err(ServerError::Serve(
                io::Error::other("server stopped with an error"),
            )),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;

    struct Echo;

    impl Service for Echo {
        fn list_handlers(&self) -> Vec<Handler> {
            vec![Handler::new(
                Resource::new("echo", "get", "echo//*msg"),
                |Path(msg): Path<String>| async move { msg },
            )]
        }
    }

    impl ServiceGroup for Echo {
        fn api_group(&self) -> &str {
            "/v1/"
        }
    }

    struct Raw(Vec<Resource>);

    impl Service for Raw {
        fn list_handlers(&self) -> Vec<Handler> {
            self.0
                .iter()
                .cloned()
                .map(|resource| Handler::new(resource, || async { "ok" }))
                .collect()
        }
    }

    struct Grouped(&'static str, Vec<Resource>);

    impl Service for Grouped {
        fn list_handlers(&self) -> Vec<Handler> {
            Raw(self.1.clone()).list_handlers()
        }
    }

    impl ServiceGroup for Grouped {
        fn api_group(&self) -> &str {
            self.0
        }
    }

    #[test]
    fn test_register_group_normalizes() {
        let mut server = Server::new(Config::default());
        server.register_service_group(&Echo).unwrap();

        let registry = server.registry();
        let registry = registry.read();
        let group = registry.list_group_resources("v1").unwrap();
        assert_eq!(group.resources, vec![Resource::new("echo", "GET", "/echo/*msg")]);
        assert_eq!(server.lifecycle(), Lifecycle::Registering);
    }

    #[test]
    fn test_duplicate_registration_conflicts() {
        let mut server = Server::new(Config::default());
        server.register_service_group(&Echo).unwrap();

        let err = server.register_service_group(&Echo).unwrap_err();
        assert!(matches!(
            err,
            RegistrationError::Conflict { ref method, ref path }
                if method == "GET" && path == "/v1/echo/*msg"
        ));
        assert_eq!(server.registry().read().resource_count(), 1);
    }

    #[test]
    fn test_same_path_different_methods() {
        let mut server = Server::new(Config::default());
        server
            .register_service(&Raw(vec![
                Resource::new("kv", "GET", "/kv/*key"),
                Resource::new("kv", "PUT", "/kv/*key"),
                Resource::new("kv", "DELETE", "/kv/*key"),
            ]))
            .unwrap();
        assert_eq!(server.registry().read().resource_count(), 3);
    }

    #[test]
    fn test_registration_is_all_or_nothing() {
        let mut server = Server::new(Config::default());
        let err = server
            .register_service(&Raw(vec![
                Resource::new("ok", "GET", "/ok"),
                Resource::new("bad", "NOT A METHOD", "/bad"),
            ]))
            .unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidMethod { .. }));
        assert!(server.registry().read().is_empty());

        // "/ok" was never mounted, so it can still be registered.
        server
            .register_service(&Raw(vec![Resource::new("ok", "GET", "/ok")]))
            .unwrap();
    }

    #[test]
    fn test_duplicate_within_one_service() {
        let mut server = Server::new(Config::default());
        let err = server
            .register_service(&Raw(vec![
                Resource::new("a", "GET", "/a"),
                Resource::new("a", "GET", "//a"),
            ]))
            .unwrap_err();
        assert!(matches!(err, RegistrationError::Conflict { .. }));
    }

    #[test]
    fn test_invalid_template_rejected() {
        let mut server = Server::new(Config::default());
        let err = server
            .register_service(&Raw(vec![Resource::new("files", "GET", "/files/*/meta")]))
            .unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidPath { .. }));
    }

    #[test]
    fn test_unsupported_method_rejected() {
        let mut server = Server::new(Config::default());
        let err = server
            .register_service(&Raw(vec![Resource::new("purge", "PURGE", "/cache")]))
            .unwrap_err();
        assert!(matches!(err, RegistrationError::UnsupportedMethod { .. }));
    }

    #[test]
    fn test_builtins_conflict_with_user_routes() {
        let mut server = Server::new(Config {
            enable_metrics: true,
            ..Config::default()
        });
        server
            .register_service(&Raw(vec![Resource::new("mine", "GET", "/metrics")]))
            .unwrap();
        assert!(matches!(
            server.into_router(),
            Err(ServerError::Registration(RegistrationError::Conflict { .. }))
        ));
    }

    #[test]
    fn test_builtins_registered_by_flags() {
        let mut server = Server::new(Config {
            enable_debug: true,
            enable_metrics: true,
            enable_discovery: true,
            ..Config::default()
        });
        let registry = server.registry();
        server.register_service_group(&Echo).unwrap();
        server.into_router().unwrap();

        let registry = registry.read();
        assert_eq!(registry.list_api_groups(), vec!["/", "debug", "v1"]);
        let root: Vec<String> = registry
            .list_resources()
            .resources
            .into_iter()
            .map(|r| r.path)
            .collect();
        assert_eq!(root, vec!["/metrics", "/apis", "/apis/", "/apis/:group"]);
        assert_eq!(registry.list_group_resources("debug").unwrap().resources.len(), 3);
    }

    #[test]
    fn test_no_builtins_by_default() {
        let server = Server::new(Config::default());
        let registry = server.registry();
        server.into_router().unwrap();
        assert!(registry.read().is_empty());
    }

    #[test]
    fn test_parameter_name_overlap_rejected() {
        let mut server = Server::new(Config::default());
        let err = server
            .register_service(&Raw(vec![
                Resource::new("get", "GET", "/items/:id"),
                Resource::new("post", "POST", "/items/:name"),
            ]))
            .unwrap_err();
        assert!(matches!(
            err,
            RegistrationError::Overlap { ref path, ref existing }
                if path == "/items/:name" && existing == "/items/:id"
        ));
        // Nothing from the rejected service was mounted.
        assert!(server.registry().read().is_empty());
        server
            .register_service(&Raw(vec![Resource::new("post", "POST", "/items/:id")]))
            .unwrap();
        server.into_router().unwrap();
    }

    #[test]
    fn test_wildcard_overlap_across_services() {
        let mut server = Server::new(Config::default());
        server
            .register_service_group(&Grouped("v1", vec![Resource::new("one", "GET", "/:id")]))
            .unwrap();
        let err = server
            .register_service_group(&Grouped("v1", vec![Resource::new("rest", "GET", "/*rest")]))
            .unwrap_err();
        assert!(matches!(err, RegistrationError::Overlap { ref path, .. } if path == "/v1/*rest"));
        assert_eq!(server.registry().read().resource_count(), 1);
        server.into_router().unwrap();
    }

    #[test]
    fn test_multi_segment_group_rejected() {
        let mut server = Server::new(Config::default());
        let err = server
            .register_service_group(&Grouped("api/v2", vec![Resource::new("a", "GET", "/a")]))
            .unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidGroup { ref group, .. } if group == "api/v2"));

        let err = server
            .register_service_group(&Grouped(":tenant", vec![Resource::new("a", "GET", "/a")]))
            .unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidGroup { .. }));
        assert!(server.registry().read().is_empty());

        // Surrounding separators are still fine.
        server
            .register_service_group(&Grouped("/v2/", vec![Resource::new("a", "GET", "/a")]))
            .unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_after_into_router_returns() {
        let server = Server::new(Config::default());
        let handle = server.shutdown_handle();
        let _router = server.into_router().unwrap();

        let result = tokio::time::timeout(Duration::from_secs(2), handle.shutdown()).await;
        assert!(matches!(result, Ok(Ok(()))));
        assert_eq!(handle.lifecycle(), Lifecycle::Stopped(StopReason::Drained));
    }

    #[tokio::test]
    async fn test_shutdown_after_drop_returns() {
        let mut server = Server::new(Config::default());
        server.register_service_group(&Echo).unwrap();
        let handle = server.shutdown_handle();
        drop(server);

        let result = tokio::time::timeout(Duration::from_secs(2), handle.shutdown()).await;
        assert!(matches!(result, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn test_shutdown_before_serve() {
        let server = Server::new(Config::new("127.0.0.1:0"));
        let handle = server.shutdown_handle();
        assert!(handle.request());
        assert!(!handle.request());

        server.run().await.unwrap();
        assert_eq!(handle.lifecycle(), Lifecycle::Stopped(StopReason::Drained));
        handle.shutdown().await.unwrap();
    }
}

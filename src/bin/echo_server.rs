//! Echo server.
//!
//! Mounts an echo service under `/v1` and, on request, the built-in
//! discovery, metrics and profiling endpoints.
//!
//! ## Usage
//!
//! ```bash
//! PORT0=32000 cargo run --bin echo_server -- --enable-discovery --enable-metrics
//! curl localhost:32000/v1/echo/hello
//! curl localhost:32000/apis/v1
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{extract::Path, http::StatusCode};
use clap::Parser;
use parking_lot::Mutex;
use tracing::{error, info};

use rest_kit::server::signal::shutdown_signal;
use rest_kit::{
    init_tracing, Config, Handler, LogFormat, Resource, Server, Service, ServiceGroup, Version,
};

/// How long the health check reports healthy before flapping.
const ALIVE_PERIOD: Duration = Duration::from_secs(120);
/// How long the health check stays unhealthy.
const DEAD_PERIOD: Duration = Duration::from_secs(30);

#[derive(Debug, Parser)]
#[command(name = "echo_server", version, about = "echo-server")]
struct Args {
    /// Mount the profiling endpoints under /debug
    #[arg(long)]
    enable_debug: bool,

    /// Instrument handlers and expose /metrics
    #[arg(long)]
    enable_metrics: bool,

    /// Expose the /apis discovery endpoints
    #[arg(long)]
    enable_discovery: bool,

    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0")]
    addr: String,

    /// Port to listen on
    #[arg(long, env = "PORT0", default_value = "32000")]
    port: u16,

    /// Seconds in-flight requests may run after shutdown starts
    /// [default: REST_GRACE_SHUTDOWN_SECS, else 60]
    #[arg(long)]
    grace_timeout_secs: Option<u64>,

    /// Log output format (json or pretty)
    #[arg(long, env = "LOG_FORMAT", default_value = "json")]
    log_format: LogFormat,
}

impl Args {
    /// Flags on top of the `REST_*` environment; a set flag wins.
    fn config(&self) -> Config {
        let env = Config::from_env();
        Config {
            bind_addr: format!("{}:{}", self.addr, self.port),
            enable_debug: self.enable_debug || env.enable_debug,
            enable_metrics: self.enable_metrics || env.enable_metrics,
            enable_discovery: self.enable_discovery || env.enable_discovery,
            grace_shutdown_timeout: self
                .grace_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(env.grace_shutdown_timeout),
        }
    }
}

#[derive(Debug)]
struct Health {
    healthy: bool,
    last_check: Instant,
}

/// Echoes the request path and reports a flapping health status.
struct EchoService {
    health: Arc<Mutex<Health>>,
}

impl EchoService {
    fn new() -> Self {
        Self {
            health: Arc::new(Mutex::new(Health {
                healthy: true,
                last_check: Instant::now(),
            })),
        }
    }
}

/// Alive for [`ALIVE_PERIOD`], then unavailable for [`DEAD_PERIOD`], and so on.
fn check_health(health: &Mutex<Health>) -> (StatusCode, &'static str) {
    let mut health = health.lock();
    let elapsed = health.last_check.elapsed();
    if health.healthy && elapsed > ALIVE_PERIOD {
        health.healthy = false;
        health.last_check = Instant::now();
    } else if !health.healthy && elapsed > DEAD_PERIOD {
        health.healthy = true;
        health.last_check = Instant::now();
    }

    if health.healthy {
        (StatusCode::OK, "OK")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "RetryLater")
    }
}

impl Service for EchoService {
    fn list_handlers(&self) -> Vec<Handler> {
        let health = Arc::clone(&self.health);
        vec![
            Handler::new(
                Resource::new("echo", "GET", "/echo/*msg"),
                |Path(msg): Path<String>| async move { msg },
            ),
            Handler::new(Resource::new("health", "GET", "/health"), move || async move {
                check_health(&health)
            }),
        ]
    }
}

impl ServiceGroup for EchoService {
    fn api_group(&self) -> &str {
        "/v1"
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_tracing(args.log_format);

    let version = Version::current();
    info!(
        version = %version.version,
        build_sha = %version.build_sha,
        "starting echo server"
    );

    let mut server = Server::new(args.config());
    server.register_service_group(&EchoService::new())?;

    let handle = server.shutdown_handle();
    tokio::spawn(async move {
        shutdown_signal().await;
        if let Err(e) = handle.shutdown().await {
            error!(error = %e, "graceful shutdown failed");
            std::process::exit(1);
        }
    });

    if let Err(e) = server.run().await {
        error!(error = %e, "echo server failed");
        std::process::exit(1);
    }
    Ok(())
}

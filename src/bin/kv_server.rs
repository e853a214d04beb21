//! Key-value server.
//!
//! Two API versions over one in-memory store:
//!
//! - `/v0/kv/*key` - `GET`, `PUT`, `DELETE` of a single key
//! - `/v1/kv/*key` - as v0, plus `?prefix` to act on every key under the
//!   prefix and `?keys` to list keys without values
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin kv_server -- --bind-addr 0.0.0.0:8500 --enable-discovery
//! curl -X PUT localhost:8500/v0/kv/greeting -d '{"value":"hi"}' -H 'content-type: application/json'
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, Json, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use clap::Parser;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use rest_kit::server::signal::shutdown_signal;
use rest_kit::{
    init_tracing, Config, Handler, LogFormat, Resource, Server, Service, ServiceGroup, Version,
};

/// Largest value accepted by `PUT`.
const MAX_DATA_LEN: usize = 512 * 1024;

#[derive(Debug, Parser)]
#[command(name = "kv_server", version, about = "kv-server")]
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

    /// Address to listen on, host:port
    #[arg(long, default_value = "0.0.0.0:8500")]
    bind_addr: String,

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
            bind_addr: self.bind_addr.clone(),
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

type Store = Arc<RwLock<BTreeMap<String, String>>>;

#[derive(Debug, Deserialize)]
struct PutBody {
    value: String,
}

#[derive(Debug, Serialize)]
struct ValueBody {
    value: String,
}

#[derive(Debug, Serialize)]
struct Kv {
    key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

fn bad_request(error: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            error: error.into(),
        }),
    )
        .into_response()
}

fn put(store: &Store, key: String, body: Result<Json<PutBody>, JsonRejection>) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return bad_request(rejection.body_text()),
    };
    if body.value.len() > MAX_DATA_LEN {
        return bad_request("exceed max_data_len(512K)");
    }
    store.write().insert(key, body.value);
    StatusCode::OK.into_response()
}

/// Single-key store, `/v0`.
struct KvServiceV0 {
    store: Store,
}

impl Service for KvServiceV0 {
    fn list_handlers(&self) -> Vec<Handler> {
        let get_store = Arc::clone(&self.store);
        let put_store = Arc::clone(&self.store);
        let delete_store = Arc::clone(&self.store);

        vec![
            Handler::new(
                Resource::new("kv", "GET", "/kv/*key"),
                move |Path(key): Path<String>| async move {
                    match get_store.read().get(&key).cloned() {
                        Some(value) => Json(ValueBody { value }).into_response(),
                        None => StatusCode::NOT_FOUND.into_response(),
                    }
                },
            ),
            Handler::new(
                Resource::new("kv", "PUT", "/kv/*key"),
                move |Path(key): Path<String>, body: Result<Json<PutBody>, JsonRejection>| async move {
                    put(&put_store, key, body)
                },
            ),
            Handler::new(
                Resource::new("kv", "DELETE", "/kv/*key"),
                move |Path(key): Path<String>| async move {
                    delete_store.write().remove(&key);
                    StatusCode::OK
                },
            ),
        ]
    }
}

impl ServiceGroup for KvServiceV0 {
    fn api_group(&self) -> &str {
        "/v0"
    }
}

/// Prefix-aware store, `/v1`.
struct KvServiceV1 {
    store: Store,
}

fn lookup(store: &Store, key: &str, params: &HashMap<String, String>) -> Option<Vec<Kv>> {
    let keys_only = params.contains_key("keys");
    let entry = |(k, v): (&String, &String)| Kv {
        key: k.clone(),
        value: (!keys_only).then(|| v.clone()),
    };

    let store = store.read();
    if params.contains_key("prefix") {
        Some(
            store
                .range(key.to_string()..)
                .take_while(|(k, _)| k.starts_with(key))
                .map(entry)
                .collect(),
        )
    } else {
        store.get_key_value(key).map(|kv| vec![entry(kv)])
    }
}

fn remove(store: &Store, key: &str, params: &HashMap<String, String>) {
    let mut store = store.write();
    if params.contains_key("prefix") {
        store.retain(|k, _| !k.starts_with(key));
    } else {
        store.remove(key);
    }
}

impl Service for KvServiceV1 {
    fn list_handlers(&self) -> Vec<Handler> {
        let get_store = Arc::clone(&self.store);
        let put_store = Arc::clone(&self.store);
        let delete_store = Arc::clone(&self.store);

        vec![
            Handler::new(
                Resource::new("kv", "GET", "/kv/*key"),
                move |Path(key): Path<String>, Query(params): Query<HashMap<String, String>>| async move {
                    match lookup(&get_store, &key, &params) {
                        Some(kvs) => Json(kvs).into_response(),
                        None => StatusCode::NOT_FOUND.into_response(),
                    }
                },
            ),
            Handler::new(
                Resource::new("kv", "PUT", "/kv/*key"),
                move |Path(key): Path<String>, body: Result<Json<PutBody>, JsonRejection>| async move {
                    put(&put_store, key, body)
                },
            ),
            Handler::new(
                Resource::new("kv", "DELETE", "/kv/*key"),
                move |Path(key): Path<String>, Query(params): Query<HashMap<String, String>>| async move {
                    remove(&delete_store, &key, &params);
                    StatusCode::OK
                },
            ),
        ]
    }
}

impl ServiceGroup for KvServiceV1 {
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
        "starting kv server"
    );

    let mut server = Server::new(args.config());

    let store = Store::default();
    server.register_service_group(&KvServiceV0 {
        store: Arc::clone(&store),
    })?;
    server.register_service_group(&KvServiceV1 { store })?;

    let handle = server.shutdown_handle();
    tokio::spawn(async move {
        shutdown_signal().await;
        if let Err(e) = handle.shutdown().await {
            error!(error = %e, "graceful shutdown failed");
            std::process::exit(1);
        }
    });

    if let Err(e) = server.run().await {
        error!(error = %e, "kv server failed");
        std::process::exit(1);
    }
    Ok(())
}

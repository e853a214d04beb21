//! Server configuration and build information.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default bind address.
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

/// Default grace period for draining in-flight requests on shutdown.
pub const DEFAULT_GRACE_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(60);

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address to bind, `host:port`.
    pub bind_addr: String,
    /// Mount the profiling endpoints under `/debug`.
    pub enable_debug: bool,
    /// Instrument handlers and expose `/metrics`.
    pub enable_metrics: bool,
    /// Expose the `/apis` discovery endpoints.
    pub enable_discovery: bool,
    /// How long in-flight requests may run after shutdown starts.
    #[serde(with = "duration_secs", rename = "grace_shutdown_timeout_secs")]
    pub grace_shutdown_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            enable_debug: false,
            enable_metrics: false,
            enable_discovery: false,
            grace_shutdown_timeout: DEFAULT_GRACE_SHUTDOWN_TIMEOUT,
        }
    }
}

impl Config {
    /// Create a configuration bound to `bind_addr` with every feature off.
    pub fn new(bind_addr: impl Into<String>) -> Self {
        Self {
            bind_addr: bind_addr.into(),
            ..Self::default()
        }
    }

    /// Read configuration from environment variables.
    ///
    /// - `HOST` / `PORT`: bind address parts (defaults `0.0.0.0` / `8080`)
    /// - `REST_ENABLE_DEBUG`, `REST_ENABLE_METRICS`, `REST_ENABLE_DISCOVERY`:
    ///   `1`/`true`/`yes`/`on` enable the feature
    /// - `REST_GRACE_SHUTDOWN_SECS`: grace period in seconds
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = lookup("PORT").unwrap_or_else(|| "8080".to_string());
        let flag = |key: &str| lookup(key).map(|v| parse_flag(&v)).unwrap_or(false);

        let grace_shutdown_timeout = match lookup("REST_GRACE_SHUTDOWN_SECS") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) => Duration::from_secs(secs),
                Err(_) => {
                    tracing::warn!(
                        value = %raw,
                        "REST_GRACE_SHUTDOWN_SECS is not a number, using default"
                    );
                    defaults.grace_shutdown_timeout
                }
            },
            None => defaults.grace_shutdown_timeout,
        };

        Self {
            bind_addr: format!("{host}:{port}"),
            enable_debug: flag("REST_ENABLE_DEBUG"),
            enable_metrics: flag("REST_ENABLE_METRICS"),
            enable_discovery: flag("REST_ENABLE_DISCOVERY"),
            grace_shutdown_timeout,
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

/// Build information baked in at compile time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    /// Crate version.
    pub version: String,
    /// `BUILD_DATE` at compile time, `unknown` if unset.
    pub build_date: String,
    /// `BUILD_SHA` at compile time, `dev` if unset.
    pub build_sha: String,
}

impl Version {
    /// Version of the running binary.
    pub fn current() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            build_date: option_env!("BUILD_DATE").unwrap_or("unknown").to_string(),
            build_sha: option_env!("BUILD_SHA").unwrap_or("dev").to_string(),
        }
    }
}

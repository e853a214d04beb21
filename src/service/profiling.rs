//! Runtime diagnostics mounted under the `debug` group.

use std::time::{Duration, Instant};

use axum::{
    extract::{Json, Query},
    http::header,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Handler, Service, ServiceGroup};
use crate::registry::Resource;

/// Group the profiling endpoints are mounted under.
pub const PROFILING_GROUP: &str = "debug";

/// Default length of a runtime profile.
pub const DEFAULT_PROFILE_SECONDS: u64 = 1;

/// Longest runtime profile a single request may ask for.
pub const MAX_PROFILE_SECONDS: u64 = 30;

const SAMPLE_INTERVAL: Duration = Duration::from_millis(100);

/// Response of `GET /debug/pprof`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileIndex {
    /// Process id.
    pub pid: u32,
    /// When the profiling service was created.
    pub started_at: DateTime<Utc>,
    /// Seconds since `started_at`.
    pub uptime_secs: u64,
    /// Profiles served under `/debug/pprof/`.
    pub profiles: Vec<String>,
}

/// Query of `GET /debug/pprof/profile`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileParams {
    /// Sampling window, clamped to `1..=MAX_PROFILE_SECONDS`.
    pub seconds: Option<u64>,
}

/// Min, max and mean of a sampled value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleStats {
    /// Smallest sample.
    pub min: usize,
    /// Largest sample.
    pub max: usize,
    /// Arithmetic mean, `0.0` without samples.
    pub mean: f64,
}

impl SampleStats {
    fn from_samples(samples: &[usize]) -> Self {
        if samples.is_empty() {
            return Self { min: 0, max: 0, mean: 0.0 };
        }
        let sum: usize = samples.iter().sum();
        Self {
            min: samples.iter().copied().min().unwrap_or(0),
            max: samples.iter().copied().max().unwrap_or(0),
            mean: sum as f64 / samples.len() as f64,
        }
    }
}

/// Response of `GET /debug/pprof/profile`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeProfile {
    /// Length of the sampling window.
    pub seconds: u64,
    /// Number of samples taken.
    pub samples: usize,
    /// Worker threads of the runtime serving the request.
    pub workers: usize,
    /// Tasks alive on the runtime at each sample.
    pub alive_tasks: SampleStats,
}

/// Process and tokio runtime diagnostics.
pub struct ProfilingService {
    started_at: DateTime<Utc>,
    started: Instant,
}

impl Default for ProfilingService {
    fn default() -> Self {
        Self {
            started_at: Utc::now(),
            started: Instant::now(),
        }
    }
}

impl ProfilingService {
    /// Create the service, taking the uptime reference from now.
    pub fn new() -> Self {
        Self::default()
    }
}

fn cmdline() -> String {
    std::env::args().collect::<Vec<_>>().join("\0")
}

fn profile_seconds(params: &ProfileParams) -> u64 {
    params
        .seconds
        .unwrap_or(DEFAULT_PROFILE_SECONDS)
        .clamp(1, MAX_PROFILE_SECONDS)
}

async fn sample_runtime(seconds: u64) -> RuntimeProfile {
    let runtime = tokio::runtime::Handle::current().metrics();
    let deadline = Instant::now() + Duration::from_secs(seconds);
    let mut interval = tokio::time::interval(SAMPLE_INTERVAL);
    let mut alive = Vec::new();

    loop {
        interval.tick().await;
        alive.push(runtime.num_alive_tasks());
        if Instant::now() >= deadline {
            break;
        }
    }

    RuntimeProfile {
        seconds,
        samples: alive.len(),
        workers: runtime.num_workers(),
        alive_tasks: SampleStats::from_samples(&alive),
    }
}

impl Service for ProfilingService {
    fn list_handlers(&self) -> Vec<Handler> {
        let started_at = self.started_at;
        let started = self.started;

        vec![
            Handler::new(Resource::new("/pprof", "GET", "/pprof"), move || async move {
                Json(ProfileIndex {
                    pid: std::process::id(),
                    started_at,
                    uptime_secs: started.elapsed().as_secs(),
                    profiles: vec!["cmdline".to_string(), "profile".to_string()],
                })
            }),
            Handler::new(
                Resource::new("/pprof/profile", "GET", "/pprof/profile"),
                |Query(params): Query<ProfileParams>| async move {
                    let seconds = profile_seconds(&params);
                    tracing::info!(seconds, "collecting runtime profile");
                    Json(sample_runtime(seconds).await)
                },
            ),
            Handler::new(
                Resource::new("/pprof/cmdline", "GET", "/pprof/cmdline"),
                || async {
                    (
                        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                        cmdline(),
                    )
                        .into_response()
                },
            ),
        ]
    }
}

impl ServiceGroup for ProfilingService {
    fn api_group(&self) -> &str {
        PROFILING_GROUP
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_seconds_clamped() {
        assert_eq!(profile_seconds(&ProfileParams::default()), DEFAULT_PROFILE_SECONDS);
        assert_eq!(profile_seconds(&ProfileParams { seconds: Some(0) }), 1);
        assert_eq!(profile_seconds(&ProfileParams { seconds: Some(5) }), 5);
        assert_eq!(
            profile_seconds(&ProfileParams { seconds: Some(3600) }),
            MAX_PROFILE_SECONDS
        );
    }

    #[test]
    fn test_sample_stats() {
        let stats = SampleStats::from_samples(&[2, 4, 6]);
        assert_eq!(stats.min, 2);
        assert_eq!(stats.max, 6);
        assert!((stats.mean - 4.0).abs() < f64::EPSILON);

        let empty = SampleStats::from_samples(&[]);
        assert_eq!(empty.max, 0);
    }

    #[test]
    fn test_cmdline_contains_program() {
        let line = cmdline();
        let program = std::env::args().next().unwrap();
        assert!(line.starts_with(&program));
    }

    #[tokio::test]
    async fn test_sample_runtime() {
        let profile = sample_runtime(1).await;
        assert_eq!(profile.seconds, 1);
        assert!(profile.samples >= 2);
        assert!(profile.workers >= 1);
    }

    #[test]
    fn test_mounted_under_debug() {
        let service = ProfilingService::new();
        assert_eq!(service.api_group(), "debug");
        assert_eq!(service.list_handlers().len(), 3);
    }
}

//! # rest-kit
//!
//! Service registry scaffolding over axum.
//!
//! Independent services register handlers under named API groups. The server
//! records every mounted resource and can expose it through a discovery
//! endpoint, alongside optional metrics and profiling endpoints.
//!
//! ## Architecture
//!
//! ```text
//! Service / ServiceGroup → Server::register_* → path::normalize → axum Router
//!                                    ↓
//!                             ServiceRegistry  ←  DiscoveryService (GET /apis)
//! ```
//!
//! ## Guarantees
//!
//! - Every path in the registry and the router is normalized
//! - Group names are canonicalized the same way on write and on lookup
//! - Registration happens-before serving; the registry is read-only after

#![warn(clippy::all)]

pub mod config;
pub mod path;
pub mod registry;
pub mod telemetry;

#[cfg(feature = "server")]
pub mod server;
#[cfg(feature = "server")]
pub mod service;

// Re-exports
pub use config::{Config, Version};
pub use path::{join, normalize, normalize_bytes, PathError};
pub use registry::{canonical_group, ApiGroup, Resource, ServiceRegistry, ROOT_GROUP};
pub use telemetry::{init_tracing, LogFormat};

#[cfg(feature = "server")]
pub use server::{Lifecycle, RegistrationError, Server, ServerError, ShutdownHandle, StopReason};
#[cfg(feature = "server")]
pub use service::{Handler, Service, ServiceGroup};

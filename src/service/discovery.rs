//! Discovery endpoints describing every registered resource.
//!
//! - `GET /apis` - `{"apis": [group names]}`, sorted
//! - `GET /apis/` - the root group
//! - `GET /apis/:group` - one group, or 404 if it is unknown

use axum::{
    extract::{Json, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use super::{Handler, Service};
use crate::registry::{ApiGroup, Resource, SharedRegistry};

/// Response of `GET /apis`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiListResponse {
    /// Known group names.
    pub apis: Vec<String>,
}

/// Error body returned by the discovery endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
    /// Machine-readable error code.
    pub code: String,
}

impl ErrorResponse {
    /// Create a new error response with code and message.
    pub fn new(code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
        }
    }

    fn group_not_found(group: &str) -> Self {
        Self::new("GROUP_NOT_FOUND", format!("APIGroup:{group} not found"))
    }
}

/// Serves the discovery endpoints from the server's own registry.
pub struct DiscoveryService {
    registry: SharedRegistry,
}

impl DiscoveryService {
    /// Bind discovery to `registry`.
    pub fn new(registry: SharedRegistry) -> Self {
        Self { registry }
    }
}

fn list_groups(registry: &SharedRegistry) -> Json<ApiListResponse> {
    Json(ApiListResponse {
        apis: registry.read().list_api_groups(),
    })
}

fn root_group(registry: &SharedRegistry) -> Json<ApiGroup> {
    Json(registry.read().list_resources())
}

fn named_group(registry: &SharedRegistry, group: &str) -> Response {
    // Clone out so the lock is released before the body is serialized.
    let found = registry.read().list_group_resources(group).cloned();
    match found {
        Some(api_group) => Json(api_group).into_response(),
        None => {
            tracing::debug!(group = %group, "discovery lookup for unknown group");
            (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse::group_not_found(group)),
            )
                .into_response()
        }
    }
}

impl Service for DiscoveryService {
    fn list_handlers(&self) -> Vec<Handler> {
        let apis = self.registry.clone();
        let root = self.registry.clone();
        let named = self.registry.clone();

        vec![
            Handler::new(Resource::new("/apis", "GET", "/apis"), move || async move {
                list_groups(&apis)
            }),
            Handler::new(Resource::new("/apis/", "GET", "/apis/"), move || async move {
                root_group(&root)
            }),
            Handler::new(
                Resource::new("/apis/apigroup", "GET", "/apis/:group"),
                move |Path(group): Path<String>| async move { named_group(&named, &group) },
            ),
        ]
    }
}

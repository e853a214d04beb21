//! Registry of mounted resources, grouped by API group.
//!
//! Group names are canonicalized by [`canonical_group`] both when resources
//! are added and when groups are looked up. Lookups only work because the two
//! sides agree, so every entry point goes through that one function.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::path::{self, PathError, SEPARATOR};

/// Name of the root group. Ungrouped services are recorded here.
pub const ROOT_GROUP: &str = "/";

/// Registry shared between the server and the discovery service.
pub type SharedRegistry = Arc<RwLock<ServiceRegistry>>;

/// Declarative description of one reachable endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resource {
    /// Human readable name.
    pub name: String,
    /// Route template, relative to the group prefix.
    pub path: String,
    /// HTTP method.
    pub method: String,
}

impl Resource {
    /// Create a resource.
    pub fn new(
        name: impl Into<String>,
        method: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            method: method.into(),
        }
    }

    /// Create a resource from a raw, possibly malformed, path.
    pub fn from_utf8(
        name: impl Into<String>,
        method: impl Into<String>,
        path: &[u8],
    ) -> Result<Self, PathError> {
        Ok(Self::new(name, method, path::normalize_bytes(path)?))
    }
}

/// A named group of resources, in registration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiGroup {
    /// Canonical group name.
    pub name: String,
    /// Resources in the order they were added.
    pub resources: Vec<Resource>,
}

impl ApiGroup {
    fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resources: Vec::new(),
        }
    }
}

/// Canonical form of a group name.
///
/// The name is normalized like a path, then stripped of surrounding
/// separators. Anything that reduces to nothing is the root group.
///
/// ```rust
/// use rest_kit::registry::{canonical_group, ROOT_GROUP};
///
/// assert_eq!(canonical_group("//v1/"), "v1");
/// assert_eq!(canonical_group(""), ROOT_GROUP);
/// ```
pub fn canonical_group(name: &str) -> String {
    let normalized = path::normalize(name);
    let trimmed = normalized.trim_matches(SEPARATOR);
    if trimmed.is_empty() {
        ROOT_GROUP.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Router prefix under which a group's resources are mounted.
///
/// The root group mounts at the empty prefix.
pub fn mount_prefix(name: &str) -> String {
    let group = canonical_group(name);
    if group == ROOT_GROUP {
        String::new()
    } else {
        format!("{SEPARATOR}{group}")
    }
}

/// Mapping from canonical group name to its resources.
#[derive(Debug, Clone, Default)]
pub struct ServiceRegistry {
    groups: BTreeMap<String, ApiGroup>,
}

impl ServiceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a fresh registry for sharing.
    pub fn shared() -> SharedRegistry {
        Arc::new(RwLock::new(Self::new()))
    }

    /// Append a resource to a group, creating the group on first use.
    ///
    /// The resource path is stored normalized. Duplicates are kept.
    pub fn add_group_resource(&mut self, group: &str, resource: Resource) {
        let name = canonical_group(group);
        let resource = Resource {
            path: path::normalize(&resource.path),
            ..resource
        };
        self.groups
            .entry(name)
            .or_insert_with_key(|name| ApiGroup::empty(name.clone()))
            .resources
            .push(resource);
    }

    /// Append a resource to the root group.
    pub fn add_resource(&mut self, resource: Resource) {
        self.add_group_resource(ROOT_GROUP, resource);
    }

    /// All known group names, sorted.
    pub fn list_api_groups(&self) -> Vec<String> {
        self.groups.keys().cloned().collect()
    }

    /// Look up a group, canonicalizing the query like the write path does.
    pub fn list_group_resources(&self, group: &str) -> Option<&ApiGroup> {
        self.groups.get(&canonical_group(group))
    }

    /// Resources of the root group, or an empty root group.
    pub fn list_resources(&self) -> ApiGroup {
        self.list_group_resources(ROOT_GROUP)
            .cloned()
            .unwrap_or_else(|| ApiGroup::empty(ROOT_GROUP))
    }

    /// Number of groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Whether no resource has been added yet.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Number of resources across all groups.
    pub fn resource_count(&self) -> usize {
        self.groups.values().map(|g| g.resources.len()).sum()
    }
}

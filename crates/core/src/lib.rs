//! dbctl core types: resource identities, cluster summaries and the field projector.

#![forbid(unsafe_code)]

use std::fmt;

use serde::{Deserialize, Serialize};

mod aggregate;
mod projection;

pub use aggregate::AggregatedError;
pub use projection::{project, MalformedResourceError};

/// Resolved API type for the described kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TypeMapping {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub plural: String,
    pub namespaced: bool,
}

impl TypeMapping {
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    /// `plural.group`, the form kubectl uses in messages (e.g. `innodbclusters.mysql.oracle.com`).
    pub fn qualified_plural(&self) -> String {
        if self.group.is_empty() {
            self.plural.clone()
        } else {
            format!("{}.{}", self.plural, self.group)
        }
    }

    /// Whether `hint` names this type: kind, plural, singular or `plural.group`, ignoring case.
    pub fn matches_hint(&self, hint: &str) -> bool {
        let hint = hint.trim();
        hint.eq_ignore_ascii_case(&self.kind)
            || hint.eq_ignore_ascii_case(&self.plural)
            || hint.eq_ignore_ascii_case(&self.qualified_plural())
    }
}

/// A located object: namespace + name + type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceIdentity {
    /// Empty for cluster-scoped kinds.
    pub namespace: String,
    pub name: String,
    pub mapping: TypeMapping,
}

impl fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}/{}", self.mapping.qualified_plural(), self.name)
        } else {
            write!(f, "{}/{} -n {}", self.mapping.qualified_plural(), self.name, self.namespace)
        }
    }
}

/// Recoverable failure for one locator candidate. Only the message takes part in dedup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemError {
    pub message: String,
}

impl ItemError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl fmt::Display for ItemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ItemError {}

/// One locator result, in locator order.
pub type Located = Result<ResourceIdentity, ItemError>;

/// Constants for fields the cluster object does not carry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlaygroundDefaults {
    pub root_user: String,
    pub port: u16,
    pub engine: String,
}

impl Default for PlaygroundDefaults {
    fn default() -> Self {
        Self { root_user: "root".to_string(), port: 3306, engine: "mysql".to_string() }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Topology {
    Standalone,
    Cluster,
}

impl Topology {
    pub fn for_instances(instances: i64) -> Self {
        if instances == 1 { Topology::Standalone } else { Topology::Cluster }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Topology::Standalone => "Standalone",
            Topology::Cluster => "Cluster",
        }
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flat summary projected from one database cluster object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSummary {
    pub namespace: String,
    pub cluster_name: String,
    pub root_user: String,
    pub port: u16,
    pub engine: String,
    pub version: String,
    pub instances: i64,
    pub server_id: i64,
    pub secret_name: String,
    pub start_time: String,
    pub status: String,
    pub online_instances: i64,
    pub topology: Topology,
    pub storage_gib: u32,
    /// `key:value ` pairs, each followed by a space.
    pub labels: String,
}

impl ClusterSummary {
    /// Replace the namespace/name read from the document with the located identity.
    pub fn with_identity(mut self, identity: &ResourceIdentity) -> Self {
        self.namespace = identity.namespace.clone();
        self.cluster_name = identity.name.clone();
        self
    }
}

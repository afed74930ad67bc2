//! dbctl kubehub: cluster access behind the [`ClusterClient`] seam, plus the resource locator.

#![forbid(unsafe_code)]

use dbctl_core::TypeMapping;
use kube::{
    api::{Api, ListParams},
    core::{ApiResource, DynamicObject},
    discovery::{Discovery, Scope},
    Client, Config,
};
use tracing::{debug, info};

mod locate;
pub mod mock;

pub use locate::{locate, LocateRequest, LocatorError};

/// Errors from the cluster-resource client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("the server doesn't have a resource type \"{0}\"")]
    UnknownType(String),
    #[error("{resource} \"{name}\" not found")]
    NotFound { resource: String, name: String },
    #[error("unavailable: {0}")]
    Unavailable(String),
    #[error("decoding {what}: {source}")]
    Decode {
        what: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Config(#[from] kube::config::InferConfigError),
    #[error(transparent)]
    Kube(#[from] kube::Error),
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound { .. })
    }
}

/// One chunk of a list call.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub items: Vec<serde_json::Value>,
    /// Present when the server has more items.
    pub continue_token: Option<String>,
}

/// Cluster-resource client capability used by the locator and the describe pipeline.
#[async_trait::async_trait]
pub trait ClusterClient: Send + Sync {
    /// Resolve a user-supplied type hint (kind, plural, singular or `plural.group`).
    async fn resolve(&self, type_hint: &str) -> Result<TypeMapping, ClientError>;

    /// List one chunk of objects; `namespace: None` lists across all namespaces.
    async fn list(
        &self,
        mapping: &TypeMapping,
        namespace: Option<&str>,
        limit: Option<u32>,
        continue_token: Option<&str>,
    ) -> Result<Page, ClientError>;

    /// Fetch one object by name.
    async fn get(&self, mapping: &TypeMapping, namespace: Option<&str>, name: &str) -> Result<serde_json::Value, ClientError>;
}

/// [`ClusterClient`] backed by a kube `Client`, restricted to one API group.
#[derive(Clone)]
pub struct KubeClusterClient {
    client: Client,
    group: String,
    default_namespace: String,
}

impl KubeClusterClient {
    /// Connect using kubeconfig or in-cluster config, as kubectl would.
    pub async fn connect(group: &str) -> Result<Self, ClientError> {
        let config = Config::infer().await?;
        let default_namespace = config.default_namespace.clone();
        let client = Client::try_from(config)?;
        info!(group = %group, ns = %default_namespace, "kube client ready");
        Ok(Self { client, group: group.to_string(), default_namespace })
    }

    pub fn new(client: Client, group: &str, default_namespace: &str) -> Self {
        Self { client, group: group.to_string(), default_namespace: default_namespace.to_string() }
    }

    /// Namespace of the current kubeconfig context.
    pub fn default_namespace(&self) -> &str {
        &self.default_namespace
    }

    fn api(&self, mapping: &TypeMapping, namespace: Option<&str>) -> Api<DynamicObject> {
        let ar = api_resource(mapping);
        match namespace {
            Some(ns) if mapping.namespaced => Api::namespaced_with(self.client.clone(), ns, &ar),
            _ => Api::all_with(self.client.clone(), &ar),
        }
    }
}

fn api_resource(mapping: &TypeMapping) -> ApiResource {
    ApiResource {
        group: mapping.group.clone(),
        version: mapping.version.clone(),
        api_version: mapping.api_version(),
        kind: mapping.kind.clone(),
        plural: mapping.plural.clone(),
    }
}

fn to_value(obj: &DynamicObject, what: &str) -> Result<serde_json::Value, ClientError> {
    serde_json::to_value(obj).map_err(|source| ClientError::Decode { what: what.to_string(), source })
}

#[async_trait::async_trait]
impl ClusterClient for KubeClusterClient {
    async fn resolve(&self, type_hint: &str) -> Result<TypeMapping, ClientError> {
        let discovery = Discovery::new(self.client.clone()).filter(&[self.group.as_str()]).run().await?;
        for group in discovery.groups() {
            for (ar, caps) in group.recommended_resources() {
                let mapping = TypeMapping {
                    group: ar.group.clone(),
                    version: ar.version.clone(),
                    kind: ar.kind.clone(),
                    plural: ar.plural.clone(),
                    namespaced: matches!(caps.scope, Scope::Namespaced),
                };
                if mapping.matches_hint(type_hint) {
                    debug!(hint = %type_hint, gvk = %format!("{}/{}", mapping.api_version(), mapping.kind), "type resolved");
                    return Ok(mapping);
                }
            }
        }
        Err(ClientError::UnknownType(type_hint.to_string()))
    }

    async fn list(
        &self,
        mapping: &TypeMapping,
        namespace: Option<&str>,
        limit: Option<u32>,
        continue_token: Option<&str>,
    ) -> Result<Page, ClientError> {
        let mut lp = ListParams::default();
        if let Some(limit) = limit {
            lp = lp.limit(limit);
        }
        if let Some(token) = continue_token {
            lp = lp.continue_token(token);
        }
        let list = self.api(mapping, namespace).list(&lp).await?;
        let continue_token = list.metadata.continue_.filter(|t| !t.is_empty());
        let items = list
            .items
            .iter()
            .map(|o| to_value(o, &mapping.qualified_plural()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page { items, continue_token })
    }

    async fn get(&self, mapping: &TypeMapping, namespace: Option<&str>, name: &str) -> Result<serde_json::Value, ClientError> {
        match self.api(mapping, namespace).get(name).await {
            Ok(obj) => to_value(&obj, &mapping.qualified_plural()),
            Err(kube::Error::Api(ae)) if ae.code == 404 => {
                Err(ClientError::NotFound { resource: mapping.qualified_plural(), name: name.to_string() })
            }
            Err(e) => Err(e.into()),
        }
    }
}

//! In-memory [`ClusterClient`] for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use dbctl_core::TypeMapping;

use crate::{ClientError, ClusterClient, Page};

/// The MySQL operator's `InnoDBCluster` type.
pub fn innodb_mapping() -> TypeMapping {
    TypeMapping {
        group: "mysql.oracle.com".to_string(),
        version: "v2".to_string(),
        kind: "InnoDBCluster".to_string(),
        plural: "innodbclusters".to_string(),
        namespaced: true,
    }
}

/// Serves a fixed set of objects of one type. Records every call for assertions.
pub struct MockClusterClient {
    mapping: TypeMapping,
    objects: Vec<serde_json::Value>,
    list_failure: Option<String>,
    get_failures: HashMap<String, String>,
    list_calls: Mutex<Vec<Option<String>>>,
    get_calls: Mutex<Vec<(Option<String>, String)>>,
}

impl MockClusterClient {
    pub fn new(mapping: TypeMapping) -> Self {
        Self {
            mapping,
            objects: Vec::new(),
            list_failure: None,
            get_failures: HashMap::new(),
            list_calls: Mutex::new(Vec::new()),
            get_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_object(mut self, obj: serde_json::Value) -> Self {
        self.objects.push(obj);
        self
    }

    /// Every list call fails with `message`.
    pub fn failing_list(mut self, message: &str) -> Self {
        self.list_failure = Some(message.to_string());
        self
    }

    /// Gets for `name` fail with `message`.
    pub fn failing_get(mut self, name: &str, message: &str) -> Self {
        self.get_failures.insert(name.to_string(), message.to_string());
        self
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.lock().map(|g| g.len()).unwrap_or_default()
    }

    /// Namespace argument of each `list` call; `None` means unscoped.
    pub fn list_namespaces(&self) -> Vec<Option<String>> {
        self.list_calls.lock().map(|g| g.clone()).unwrap_or_default()
    }

    /// Names passed to `get`, in call order.
    pub fn get_calls(&self) -> Vec<String> {
        self.get_calls.lock().map(|g| g.iter().map(|(_, name)| name.clone()).collect()).unwrap_or_default()
    }

    /// Namespace argument of each `get` call, in call order.
    pub fn get_namespaces(&self) -> Vec<Option<String>> {
        self.get_calls.lock().map(|g| g.iter().map(|(ns, _)| ns.clone()).collect()).unwrap_or_default()
    }

    fn meta<'a>(obj: &'a serde_json::Value, key: &str) -> Option<&'a str> {
        obj.get("metadata").and_then(|m| m.get(key)).and_then(|v| v.as_str())
    }

    fn in_scope(obj: &serde_json::Value, namespace: Option<&str>) -> bool {
        match namespace {
            Some(ns) => Self::meta(obj, "namespace") == Some(ns),
            None => true,
        }
    }
}

#[async_trait::async_trait]
impl ClusterClient for MockClusterClient {
    async fn resolve(&self, type_hint: &str) -> Result<TypeMapping, ClientError> {
        if self.mapping.matches_hint(type_hint) {
            Ok(self.mapping.clone())
        } else {
            Err(ClientError::UnknownType(type_hint.to_string()))
        }
    }

    async fn list(
        &self,
        _mapping: &TypeMapping,
        namespace: Option<&str>,
        limit: Option<u32>,
        continue_token: Option<&str>,
    ) -> Result<Page, ClientError> {
        if let Ok(mut calls) = self.list_calls.lock() {
            calls.push(namespace.map(str::to_string));
        }
        if let Some(msg) = &self.list_failure {
            return Err(ClientError::Unavailable(msg.clone()));
        }
        let matching: Vec<_> = self.objects.iter().filter(|o| Self::in_scope(o, namespace)).cloned().collect();
        let start: usize = match continue_token {
            Some(t) => t.parse().map_err(|_| ClientError::Unavailable(format!("bad continue token {}", t)))?,
            None => 0,
        };
        let end = match limit {
            Some(l) => (start + l as usize).min(matching.len()),
            None => matching.len(),
        };
        let continue_token = (end < matching.len()).then(|| end.to_string());
        Ok(Page { items: matching[start.min(end)..end].to_vec(), continue_token })
    }

    async fn get(&self, mapping: &TypeMapping, namespace: Option<&str>, name: &str) -> Result<serde_json::Value, ClientError> {
        if let Ok(mut calls) = self.get_calls.lock() {
            calls.push((namespace.map(str::to_string), name.to_string()));
        }
        if let Some(msg) = self.get_failures.get(name) {
            return Err(ClientError::Unavailable(msg.clone()));
        }
        self.objects
            .iter()
            .find(|o| Self::in_scope(o, namespace) && Self::meta(o, "name") == Some(name))
            .cloned()
            .ok_or_else(|| ClientError::NotFound { resource: mapping.qualified_plural(), name: name.to_string() })
    }
}

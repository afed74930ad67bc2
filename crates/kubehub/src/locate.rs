//! Resource locator: turns a type hint plus optional names into located identities.
//!
//! Per-item problems (a name that does not exist, a listed object without a name)
//! come back as `Err(ItemError)` entries so enumeration keeps going. Anything else
//! from the client aborts with [`LocatorError`].

use std::collections::HashSet;

use dbctl_core::{ItemError, Located, ResourceIdentity, TypeMapping};
use metrics::counter;
use tracing::{debug, info, warn};

use crate::{ClientError, ClusterClient};

/// What to locate.
#[derive(Debug, Clone)]
pub struct LocateRequest<'a> {
    pub type_hint: &'a str,
    /// Namespace constraint; ignored when `all_namespaces` is set or the kind is cluster-scoped.
    pub namespace: &'a str,
    pub all_namespaces: bool,
    /// Empty means every instance of the kind.
    pub names: &'a [String],
    /// Items per list request; 0 disables chunking.
    pub chunk_size: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum LocatorError {
    #[error("resolving resource type \"{hint}\": {source}")]
    Resolve {
        hint: String,
        #[source]
        source: ClientError,
    },
    #[error("listing {resource}: {source}")]
    List {
        resource: String,
        #[source]
        source: ClientError,
    },
    #[error("looking up {resource} \"{name}\": {source}")]
    Lookup {
        resource: String,
        name: String,
        #[source]
        source: ClientError,
    },
}

/// Locate resources for `req`, preserving server order for lists and argument order for names.
pub async fn locate<C>(client: &C, req: &LocateRequest<'_>) -> Result<Vec<Located>, LocatorError>
where
    C: ClusterClient + ?Sized,
{
    let mapping = client
        .resolve(req.type_hint)
        .await
        .map_err(|source| LocatorError::Resolve { hint: req.type_hint.to_string(), source })?;
    let scope = if req.all_namespaces || !mapping.namespaced { None } else { Some(req.namespace) };
    info!(resource = %mapping.qualified_plural(), ns = ?scope, names = req.names.len(), "locate start");

    let located = if req.names.is_empty() {
        list_all(client, &mapping, scope, req.chunk_size)
            .await?
            .iter()
            .map(|item| identity_from(&mapping, item))
            .collect()
    } else if scope.is_none() && mapping.namespaced {
        let items = list_all(client, &mapping, None, req.chunk_size).await?;
        filter_by_names(&mapping, &items, req.names)
    } else {
        get_by_names(client, &mapping, scope, req.names).await?
    };

    let soft = located.iter().filter(|l| l.is_err()).count();
    info!(found = located.len() - soft, soft_errors = soft, "locate done");
    Ok(located)
}

/// Follow continue tokens until the server reports no more chunks.
async fn list_all<C>(
    client: &C,
    mapping: &TypeMapping,
    namespace: Option<&str>,
    chunk_size: u32,
) -> Result<Vec<serde_json::Value>, LocatorError>
where
    C: ClusterClient + ?Sized,
{
    let limit = (chunk_size > 0).then_some(chunk_size);
    let mut out = Vec::new();
    let mut token: Option<String> = None;
    loop {
        let page = client
            .list(mapping, namespace, limit, token.as_deref())
            .await
            .map_err(|source| LocatorError::List { resource: mapping.qualified_plural(), source })?;
        counter!("locate_pages_total", 1u64);
        debug!(items = page.items.len(), more = page.continue_token.is_some(), "list page");
        out.extend(page.items);
        match page.continue_token {
            Some(next) => token = Some(next),
            None => break,
        }
    }
    Ok(out)
}

fn identity_from(mapping: &TypeMapping, item: &serde_json::Value) -> Located {
    let meta = item.get("metadata");
    let name = meta.and_then(|m| m.get("name")).and_then(|v| v.as_str());
    let namespace = meta.and_then(|m| m.get("namespace")).and_then(|v| v.as_str()).unwrap_or("");
    match name {
        Some(name) if !name.is_empty() => {
            Ok(ResourceIdentity { namespace: namespace.to_string(), name: name.to_string(), mapping: mapping.clone() })
        }
        _ => {
            warn!(resource = %mapping.qualified_plural(), ns = %namespace, "listed object has no metadata.name");
            Err(ItemError::new(format!("{}: object has no metadata.name", mapping.qualified_plural())))
        }
    }
}

fn not_found(mapping: &TypeMapping, name: &str) -> ItemError {
    ItemError::new(ClientError::NotFound { resource: mapping.qualified_plural(), name: name.to_string() }.to_string())
}

/// Names across all namespaces: keep listed objects whose name was requested,
/// then report requested names that matched nothing. A nameless object cannot
/// match a requested name and is skipped.
fn filter_by_names(mapping: &TypeMapping, items: &[serde_json::Value], names: &[String]) -> Vec<Located> {
    let wanted: HashSet<&str> = names.iter().map(String::as_str).collect();
    let mut matched: HashSet<String> = HashSet::new();
    let mut out = Vec::new();
    for item in items {
        let Ok(id) = identity_from(mapping, item) else {
            continue;
        };
        if !wanted.contains(id.name.as_str()) {
            continue;
        }
        matched.insert(id.name.clone());
        out.push(Ok(id));
    }
    for name in names {
        if !matched.contains(name) {
            out.push(Err(not_found(mapping, name)));
        }
    }
    out
}

async fn get_by_names<C>(
    client: &C,
    mapping: &TypeMapping,
    namespace: Option<&str>,
    names: &[String],
) -> Result<Vec<Located>, LocatorError>
where
    C: ClusterClient + ?Sized,
{
    let mut out = Vec::with_capacity(names.len());
    for name in names {
        // Existence check only; the describer fetches the current document again.
        match client.get(mapping, namespace, name).await {
            Ok(_) => out.push(Ok(ResourceIdentity {
                namespace: namespace.unwrap_or("").to_string(),
                name: name.clone(),
                mapping: mapping.clone(),
            })),
            Err(e) if e.is_not_found() => {
                debug!(name = %name, ns = ?namespace, "not found");
                out.push(Err(ItemError::new(e.to_string())));
            }
            Err(source) => {
                return Err(LocatorError::Lookup { resource: mapping.qualified_plural(), name: name.clone(), source })
            }
        }
    }
    Ok(out)
}

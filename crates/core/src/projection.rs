//! Field projection from an untyped cluster object into a [`ClusterSummary`].
//!
//! Every required field is read through an explicit path lookup that asserts the
//! JSON type. Nothing is coerced: `3.0` is not an integer and `"3"` is not a number.

use serde_json::{Map, Value};

use crate::{ClusterSummary, PlaygroundDefaults, Topology};

// TODO: replace with the PVC capacity of the cluster's data volumes once the
// describe path reads the owned StatefulSet.
const PLACEHOLDER_STORAGE_GIB: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedResourceError {
    #[error("malformed resource: missing field `{path}`")]
    Missing { path: String },
    #[error("malformed resource: field `{path}` should be {expected}, found {found}")]
    WrongType { path: String, expected: &'static str, found: &'static str },
}

impl MalformedResourceError {
    /// Dotted path of the offending field.
    pub fn path(&self) -> &str {
        match self {
            MalformedResourceError::Missing { path } => path,
            MalformedResourceError::WrongType { path, .. } => path,
        }
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_i64() => "integer",
        Value::Number(n) if n.is_u64() => "integer out of range",
        Value::Number(_) => "float",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Walk dotted `path` from `root`. Each intermediate segment must be an object.
fn lookup<'a>(root: &'a Value, path: &str) -> Result<&'a Value, MalformedResourceError> {
    let mut cur = root;
    let mut walked = 0usize;
    for seg in path.split('.') {
        let end = walked + seg.len();
        let here = &path[..end];
        let parent = if walked == 0 { None } else { Some(&path[..walked - 1]) };
        match cur {
            Value::Object(map) => {
                cur = map.get(seg).ok_or_else(|| MalformedResourceError::Missing { path: here.to_string() })?;
            }
            other => {
                return Err(MalformedResourceError::WrongType {
                    path: parent.unwrap_or("").to_string(),
                    expected: "object",
                    found: type_name(other),
                })
            }
        }
        walked = end + 1;
    }
    Ok(cur)
}

fn object_at<'a>(root: &'a Value, path: &str) -> Result<&'a Map<String, Value>, MalformedResourceError> {
    let v = lookup(root, path)?;
    v.as_object().ok_or_else(|| MalformedResourceError::WrongType {
        path: path.to_string(),
        expected: "object",
        found: type_name(v),
    })
}

fn string_at(root: &Value, path: &str) -> Result<String, MalformedResourceError> {
    let v = lookup(root, path)?;
    v.as_str().map(str::to_string).ok_or_else(|| MalformedResourceError::WrongType {
        path: path.to_string(),
        expected: "string",
        found: type_name(v),
    })
}

fn int_at(root: &Value, path: &str) -> Result<i64, MalformedResourceError> {
    let v = lookup(root, path)?;
    v.as_i64().ok_or_else(|| MalformedResourceError::WrongType {
        path: path.to_string(),
        expected: "integer",
        found: type_name(v),
    })
}

fn optional_meta_str(doc: &Value, key: &str) -> String {
    doc.get("metadata").and_then(|m| m.get(key)).and_then(|v| v.as_str()).unwrap_or("").to_string()
}

/// Render `metadata.labels` as `key:value ` pairs. Absent labels render as an empty string.
fn render_labels(doc: &Value) -> Result<String, MalformedResourceError> {
    let labels = match doc.get("metadata") {
        None | Some(Value::Null) => return Ok(String::new()),
        Some(Value::Object(meta)) => match meta.get("labels") {
            None | Some(Value::Null) => return Ok(String::new()),
            Some(Value::Object(labels)) => labels,
            Some(other) => {
                return Err(MalformedResourceError::WrongType {
                    path: "metadata.labels".to_string(),
                    expected: "object",
                    found: type_name(other),
                })
            }
        },
        Some(other) => {
            return Err(MalformedResourceError::WrongType {
                path: "metadata".to_string(),
                expected: "object",
                found: type_name(other),
            })
        }
    };
    let mut out = String::new();
    for (k, v) in labels {
        let v = v.as_str().ok_or_else(|| MalformedResourceError::WrongType {
            path: format!("metadata.labels.{}", k),
            expected: "string",
            found: type_name(v),
        })?;
        out.push_str(k);
        out.push(':');
        out.push_str(v);
        out.push(' ');
    }
    Ok(out)
}

/// Project one cluster object. Pure; `namespace`/`cluster_name` come from `metadata`
/// when present and are normally overwritten with the located identity.
pub fn project(doc: &Value, defaults: &PlaygroundDefaults) -> Result<ClusterSummary, MalformedResourceError> {
    object_at(doc, "spec")?;
    object_at(doc, "status")?;
    object_at(doc, "status.cluster")?;
    let labels = render_labels(doc)?;

    let version = string_at(doc, "spec.version")?;
    let instances = int_at(doc, "spec.instances")?;
    let server_id = int_at(doc, "spec.baseServerId")?;
    let secret_name = string_at(doc, "spec.secretName")?;
    let start_time = string_at(doc, "status.createTime")?;
    let status = string_at(doc, "status.cluster.status")?;
    let online_instances = int_at(doc, "status.cluster.onlineInstances")?;

    Ok(ClusterSummary {
        namespace: optional_meta_str(doc, "namespace"),
        cluster_name: optional_meta_str(doc, "name"),
        root_user: defaults.root_user.clone(),
        port: defaults.port,
        engine: defaults.engine.clone(),
        version,
        instances,
        server_id,
        secret_name,
        start_time,
        status,
        online_instances,
        topology: Topology::for_instances(instances),
        storage_gib: PLACEHOLDER_STORAGE_GIB,
        labels,
    })
}

//! Pure transformations on notebook documents.
//!
//! A clone submitted for re-creation must look like a document the cluster
//! has never seen: new name, no cluster-assigned metadata, no status, and
//! the GPU resource declarations of its target variant. Nothing here talks
//! to the cluster.

use std::fmt;

use error_stack::Report;
use kube::api::DynamicObject;
use serde_json::Map;
use serde_json::Value;

use crate::k8s::error::SwitchError;

/// Migration direction, determining both the name suffix and the resource
/// transform applied to the cloned document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Gpu,
    Cpu,
}

impl Direction {
    /// Suffix carried by notebook names migrated in this direction.
    pub fn suffix(self) -> &'static str {
        match self {
            Direction::Gpu => "gpu",
            Direction::Cpu => "cpu",
        }
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::Gpu => Direction::Cpu,
            Direction::Cpu => Direction::Gpu,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Derive the clone's name from the source name.
///
/// A trailing segment equal to the opposite direction's suffix is replaced,
/// any other name gets the direction's suffix appended. A name without a
/// separator, or with a leading separator, is treated as having no suffix.
pub fn derive_target_name(name: &str, direction: Direction) -> String {
    match name.rfind('-') {
        Some(idx) if idx > 0 && &name[idx + 1..] == direction.opposite().suffix() => {
            format!("{}-{}", &name[..idx], direction.suffix())
        }
        _ => format!("{name}-{}", direction.suffix()),
    }
}

/// Transient, cluster-assigned metadata fields that must not survive a
/// clone.
const TRANSIENT_METADATA_FIELDS: [&str; 6] = [
    "resourceVersion",
    "uid",
    "generation",
    "creationTimestamp",
    "managedFields",
    "ownerReferences",
];

/// Prepare a cloned document for re-creation under a new name.
///
/// Clears every cluster-assigned metadata field, rewrites the `app` label
/// to the new name when present and drops the `status` subtree. Idempotent;
/// fields that are already absent are left alone.
pub fn scrub_for_recreation(doc: &mut DynamicObject, new_name: &str) {
    doc.metadata.name = Some(new_name.to_string());
    doc.metadata.resource_version = None;
    doc.metadata.uid = None;
    doc.metadata.generation = None;
    doc.metadata.creation_timestamp = None;
    doc.metadata.managed_fields = None;
    doc.metadata.owner_references = None;
    if let Some(labels) = doc.metadata.labels.as_mut() {
        if labels.contains_key("app") {
            labels.insert("app".to_string(), new_name.to_string());
        }
    }

    // The raw tree can carry its own copy of the metadata next to the
    // typed one; scrub it the same way.
    if let Some(meta) = doc.data.get_mut("metadata").and_then(Value::as_object_mut) {
        for field in TRANSIENT_METADATA_FIELDS {
            meta.remove(field);
        }
        if let Some(labels) = meta.get_mut("labels").and_then(Value::as_object_mut) {
            if labels.contains_key("app") {
                labels.insert("app".to_string(), Value::String(new_name.to_string()));
            }
        }
    }

    if let Some(root) = doc.data.as_object_mut() {
        root.remove("status");
    }
}

/// Ensure every container requests and is limited to `count` devices under
/// `resource_key`, creating intermediate maps as needed.
///
/// # Errors
///
/// - [`SwitchError::Structure`] if the container list is missing, empty,
///   or an entry is not a map
pub fn inject_gpu_profile(
    doc: &mut DynamicObject,
    resource_key: &str,
    count: u32,
) -> Result<(), Report<SwitchError>> {
    let quantity = Value::String(count.to_string());
    for (index, container) in containers_mut(doc)?.iter_mut().enumerate() {
        let container = container
            .as_object_mut()
            .ok_or_else(|| structure_error(format!("container[{index}] has unexpected type")))?;
        let resources = ensure_object(container, "resources");
        for section in ["limits", "requests"] {
            ensure_object(resources, section).insert(resource_key.to_string(), quantity.clone());
        }
    }
    Ok(())
}

/// Remove `resource_key` from every container's limits and requests,
/// dropping maps that end up empty. A container without a `resources`
/// section is left untouched.
///
/// Same structural contract as [`inject_gpu_profile`].
pub fn strip_gpu_profile(
    doc: &mut DynamicObject,
    resource_key: &str,
) -> Result<(), Report<SwitchError>> {
    for (index, container) in containers_mut(doc)?.iter_mut().enumerate() {
        let container = container
            .as_object_mut()
            .ok_or_else(|| structure_error(format!("container[{index}] has unexpected type")))?;
        let Some(resources) = container.get_mut("resources").and_then(Value::as_object_mut) else {
            continue;
        };
        for section in ["limits", "requests"] {
            if let Some(entries) = resources.get_mut(section).and_then(Value::as_object_mut) {
                entries.remove(resource_key);
                if entries.is_empty() {
                    resources.remove(section);
                }
            }
        }
        if resources.is_empty() {
            container.remove("resources");
        }
    }
    Ok(())
}

fn containers_mut(doc: &mut DynamicObject) -> Result<&mut Vec<Value>, Report<SwitchError>> {
    let containers = doc
        .data
        .pointer_mut("/spec/template/spec/containers")
        .and_then(Value::as_array_mut)
        .ok_or_else(|| structure_error("containers not found in notebook spec".to_string()))?;
    if containers.is_empty() {
        return Err(structure_error(
            "notebook spec has no containers".to_string(),
        ));
    }
    Ok(containers)
}

/// Get `key` as a mutable object, replacing whatever non-object value may
/// be there.
fn ensure_object<'a>(parent: &'a mut Map<String, Value>, key: &str) -> &'a mut Map<String, Value> {
    let slot = parent
        .entry(key.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    match slot {
        Value::Object(map) => map,
        _ => unreachable!("slot was just set to an object"),
    }
}

fn structure_error(message: String) -> Report<SwitchError> {
    Report::new(SwitchError::Structure { message })
}

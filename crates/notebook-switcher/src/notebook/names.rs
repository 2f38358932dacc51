//! Logical notebook identity helpers.
//!
//! Pod names carry a cluster-assigned trailing segment (`nb-0`,
//! `nb-gpu-7f8`); the notebook itself is addressed by the name with that
//! segment stripped.

/// Strip the trailing generated segment from a pod name.
///
/// Names without a separator, or with only a leading one, are returned
/// unchanged.
pub fn logical_notebook_name(pod_name: &str) -> &str {
    match pod_name.rfind('-') {
        Some(idx) if idx > 0 => &pod_name[..idx],
        _ => pod_name,
    }
}

/// Caller-facing path of a notebook, as served by the Kubeflow UI.
/// Empty when no replacement name is known.
pub fn notebook_url(namespace: &str, notebook_name: &str) -> String {
    if notebook_name.is_empty() {
        return String::new();
    }
    format!("/notebook/{namespace}/{notebook_name}/")
}

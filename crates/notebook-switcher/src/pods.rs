//! Pod discovery and readiness polling.
//!
//! The only part of the migration with real timing behavior: discovery
//! backs off exponentially while the notebook controller materializes the
//! pod, readiness polls at a fixed interval until the pod reports Ready or
//! reaches a state it can never recover from.

use std::time::Duration;

use error_stack::Report;
use k8s_openapi::api::core::v1::Pod;
use tokio::time::sleep;
use tokio::time::sleep_until;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::k8s::error::SwitchError;
use crate::k8s::repository::NotebookRepository;

/// Applied to discovery when the caller supplies no deadline.
const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(180);
/// Discovery backoff bounds: 200ms doubling up to 2s.
const INITIAL_BACKOFF: Duration = Duration::from_millis(200);
const MAX_BACKOFF: Duration = Duration::from_secs(2);
/// Fixed readiness poll interval; the overall deadline bounds the wait,
/// not an iteration count.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Label the notebook controller stamps on pods it owns.
const NOTEBOOK_NAME_LABEL: &str = "notebook-name";

/// Wait until the notebook has at least one pod and return the first pod
/// name in ascending name order.
///
/// Pod name suffixes are cluster-assigned, so the lexicographically
/// smallest name is the deterministic choice of "first". Listing errors
/// are returned immediately rather than retried: an authorization or
/// connectivity problem will not resolve by polling.
///
/// # Errors
///
/// - [`SwitchError::Api`] if listing pods fails
/// - [`SwitchError::Timeout`] when the deadline expires before a pod shows up
/// - [`SwitchError::Canceled`] when the cancellation token fires first
pub async fn find_first_pod_by_notebook<R: NotebookRepository + ?Sized>(
    repository: &R,
    namespace: &str,
    notebook_name: &str,
    deadline: Option<Instant>,
    cancel: &CancellationToken,
) -> Result<String, Report<SwitchError>> {
    let selector = format!("{NOTEBOOK_NAME_LABEL}={notebook_name}");
    let deadline = deadline.unwrap_or_else(|| Instant::now() + DISCOVERY_TIMEOUT);
    let mut delay = INITIAL_BACKOFF;

    loop {
        let pods = repository.list_pods(namespace, &selector).await?;
        if let Some(name) = first_pod_name(&pods) {
            return Ok(name);
        }
        debug!(%namespace, %notebook_name, ?delay, "No pod yet, backing off");

        tokio::select! {
            () = cancel.cancelled() => {
                return Err(Report::new(SwitchError::Canceled {
                    operation: format!("discovery of a pod for notebook {notebook_name}"),
                }));
            }
            () = sleep_until(deadline) => {
                return Err(Report::new(SwitchError::Timeout {
                    operation: format!("discovery of a pod for notebook {notebook_name}"),
                }));
            }
            () = sleep(delay) => {
                delay = (delay * 2).min(MAX_BACKOFF);
            }
        }
    }
}

fn first_pod_name(pods: &[Pod]) -> Option<String> {
    pods.iter().filter_map(|pod| pod.metadata.name.clone()).min()
}

/// Block until the named pod is observed Ready.
///
/// A pod that does not exist yet keeps the poll going (the record may not
/// have propagated); a pod marked for deletion or in a terminal phase can
/// never become Ready and fails immediately. `fallback_timeout` bounds the
/// wait only when the caller supplied no deadline.
///
/// # Errors
///
/// - [`SwitchError::Api`] if a poll request fails
/// - [`SwitchError::PodDeleting`] when the pod carries a deletion timestamp
/// - [`SwitchError::PodTerminal`] when the pod reached Succeeded or Failed
/// - [`SwitchError::Timeout`] / [`SwitchError::Canceled`] on deadline or
///   cancellation
pub async fn wait_pod_ready<R: NotebookRepository + ?Sized>(
    repository: &R,
    namespace: &str,
    pod_name: &str,
    deadline: Option<Instant>,
    fallback_timeout: Duration,
    cancel: &CancellationToken,
) -> Result<(), Report<SwitchError>> {
    let deadline = deadline.unwrap_or_else(|| Instant::now() + fallback_timeout);

    loop {
        if let Some(pod) = repository.get_pod(namespace, pod_name).await? {
            if pod.metadata.deletion_timestamp.is_some() {
                return Err(Report::new(SwitchError::PodDeleting {
                    pod_name: pod_name.to_string(),
                }));
            }
            let phase = pod
                .status
                .as_ref()
                .and_then(|status| status.phase.as_deref())
                .unwrap_or("Unknown");
            if phase == "Succeeded" || phase == "Failed" {
                return Err(Report::new(SwitchError::PodTerminal {
                    pod_name: pod_name.to_string(),
                    phase: phase.to_string(),
                }));
            }
            if is_pod_ready(&pod) {
                return Ok(());
            }
        }

        tokio::select! {
            () = cancel.cancelled() => {
                return Err(Report::new(SwitchError::Canceled {
                    operation: format!("readiness of pod {pod_name}"),
                }));
            }
            () = sleep_until(deadline) => {
                return Err(Report::new(SwitchError::Timeout {
                    operation: format!("readiness of pod {pod_name}"),
                }));
            }
            () = sleep(POLL_INTERVAL) => {}
        }
    }
}

/// Running and carrying a `Ready` condition with status `"True"`.
fn is_pod_ready(pod: &Pod) -> bool {
    let Some(status) = pod.status.as_ref() else {
        return false;
    };
    if status.phase.as_deref() != Some("Running") {
        return false;
    }
    status
        .conditions
        .iter()
        .flatten()
        .any(|condition| condition.type_ == "Ready" && condition.status == "True")
}

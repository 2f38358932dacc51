use thiserror::Error;

/// Errors that can occur while migrating a notebook between variants.
#[derive(Debug, Error)]
pub enum SwitchError {
    #[error("Failed to connect to Kubernetes API: {message}")]
    ClusterConnection { message: String },
    #[error("Cluster API request failed: {message}")]
    Api { message: String },
    #[error("Notebook document has unexpected structure: {message}")]
    Structure { message: String },
    #[error("Pod {pod_name} is being deleted")]
    PodDeleting { pod_name: String },
    #[error("Pod {pod_name} reached terminal phase {phase}")]
    PodTerminal { pod_name: String, phase: String },
    #[error("Timed out waiting for {operation}")]
    Timeout { operation: String },
    #[error("Canceled while waiting for {operation}")]
    Canceled { operation: String },
}

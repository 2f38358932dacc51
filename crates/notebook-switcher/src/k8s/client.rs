//! Kubernetes client construction.

use std::path::Path;
use std::path::PathBuf;

use error_stack::Report;
use error_stack::ResultExt;
use kube::config::KubeConfigOptions;
use kube::config::Kubeconfig;
use kube::Client;
use kube::Config;
use tracing::debug;

use crate::k8s::error::SwitchError;

/// Build the client every cluster call goes through.
///
/// An explicit kubeconfig path wins; without one, kube's default chain
/// applies (in-cluster service account, then `~/.kube/config`).
///
/// # Errors
///
/// - [`SwitchError::ClusterConnection`] if the kubeconfig cannot be read
///   or no usable cluster configuration exists
pub async fn init_kube_client(kubeconfig: Option<PathBuf>) -> Result<Client, Report<SwitchError>> {
    match kubeconfig {
        Some(path) => {
            debug!(path = %path.display(), "Using explicit kubeconfig");
            client_from_kubeconfig(&path).await
        }
        None => Client::try_default()
            .await
            .change_context(SwitchError::ClusterConnection {
                message: "no in-cluster or default kubeconfig available".to_string(),
            }),
    }
}

async fn client_from_kubeconfig(path: &Path) -> Result<Client, Report<SwitchError>> {
    let kubeconfig =
        Kubeconfig::read_from(path).change_context(SwitchError::ClusterConnection {
            message: format!("unreadable kubeconfig at {}", path.display()),
        })?;

    let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .change_context(SwitchError::ClusterConnection {
            message: format!("kubeconfig at {} selects no usable context", path.display()),
        })?;

    Client::try_from(config).change_context(SwitchError::ClusterConnection {
        message: format!("client construction from {} failed", path.display()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_kubeconfig_path_is_a_connection_error() {
        let Err(err) = init_kube_client(Some(PathBuf::from("/definitely/not/here.yaml"))).await
        else {
            panic!("no kubeconfig exists at that path");
        };

        assert!(matches!(
            err.current_context(),
            SwitchError::ClusterConnection { .. }
        ));
    }
}

use std::collections::BTreeMap;

use async_trait::async_trait;
use error_stack::Report;
use error_stack::ResultExt;
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::api::core::v1::Pod;
use kube::api::Api;
use kube::api::ApiResource;
use kube::api::DeleteParams;
use kube::api::DynamicObject;
use kube::api::GroupVersionKind;
use kube::api::ListParams;
use kube::api::PostParams;
use kube::Client;

use crate::config::SWITCHER_CONFIG_MAP;
use crate::k8s::error::SwitchError;

/// Cluster-side operations the migration depends on.
///
/// Kept behind a trait so the poller and the orchestrator can be exercised
/// against an in-memory fake.
#[async_trait]
pub trait NotebookRepository: Send + Sync {
    /// Fetch a Notebook document by name.
    async fn get_notebook(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<DynamicObject, Report<SwitchError>>;

    /// Submit a new Notebook document.
    async fn create_notebook(
        &self,
        namespace: &str,
        notebook: &DynamicObject,
    ) -> Result<(), Report<SwitchError>>;

    /// Delete a Notebook with foreground (cascading) propagation. The call
    /// only covers API acceptance, not the actual removal.
    async fn delete_notebook(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<(), Report<SwitchError>>;

    /// List pods matching a label selector. An empty list is not an error.
    async fn list_pods(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<Pod>, Report<SwitchError>>;

    /// Fetch a pod by name. `None` when the pod does not exist (yet).
    async fn get_pod(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Pod>, Report<SwitchError>>;

    /// Read the switcher ConfigMap data. `None` when the record is absent.
    async fn get_switcher_config(
        &self,
        namespace: &str,
    ) -> Result<Option<BTreeMap<String, String>>, Report<SwitchError>>;
}

/// `NotebookRepository` backed by the real cluster API.
///
/// Notebooks are a custom resource, so they go through the dynamic API
/// with an [`ApiResource`] built from the `kubeflow.org/v1` GVK.
pub struct KubeRepository {
    client: Client,
    notebook_resource: ApiResource,
}

impl KubeRepository {
    pub fn new(client: Client) -> Self {
        let gvk = GroupVersionKind::gvk("kubeflow.org", "v1", "Notebook");
        Self {
            client,
            notebook_resource: ApiResource::from_gvk_with_plural(&gvk, "notebooks"),
        }
    }

    fn notebooks(&self, namespace: &str) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), namespace, &self.notebook_resource)
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(response) if response.code == 404)
}

#[async_trait]
impl NotebookRepository for KubeRepository {
    async fn get_notebook(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<DynamicObject, Report<SwitchError>> {
        self.notebooks(namespace)
            .get(name)
            .await
            .change_context(SwitchError::Api {
                message: format!("Failed to get notebook {namespace}/{name}"),
            })
    }

    async fn create_notebook(
        &self,
        namespace: &str,
        notebook: &DynamicObject,
    ) -> Result<(), Report<SwitchError>> {
        let name = notebook.metadata.name.as_deref().unwrap_or("<unnamed>");
        self.notebooks(namespace)
            .create(&PostParams::default(), notebook)
            .await
            .map(|_| ())
            .change_context(SwitchError::Api {
                message: format!("Failed to create notebook {namespace}/{name}"),
            })
    }

    async fn delete_notebook(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<(), Report<SwitchError>> {
        self.notebooks(namespace)
            .delete(name, &DeleteParams::foreground())
            .await
            .map(|_| ())
            .change_context(SwitchError::Api {
                message: format!("Failed to delete notebook {namespace}/{name}"),
            })
    }

    async fn list_pods(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<Pod>, Report<SwitchError>> {
        let params = ListParams::default().labels(label_selector);
        let list = self
            .pods(namespace)
            .list(&params)
            .await
            .change_context(SwitchError::Api {
                message: format!("Failed to list pods in {namespace} matching {label_selector}"),
            })?;
        Ok(list.items)
    }

    async fn get_pod(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Pod>, Report<SwitchError>> {
        match self.pods(namespace).get(name).await {
            Ok(pod) => Ok(Some(pod)),
            Err(err) if is_not_found(&err) => Ok(None),
            Err(err) => Err(err).change_context(SwitchError::Api {
                message: format!("Failed to get pod {namespace}/{name}"),
            }),
        }
    }

    async fn get_switcher_config(
        &self,
        namespace: &str,
    ) -> Result<Option<BTreeMap<String, String>>, Report<SwitchError>> {
        let config_maps: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        match config_maps.get(SWITCHER_CONFIG_MAP).await {
            Ok(config_map) => Ok(config_map.data),
            Err(err) if is_not_found(&err) => Ok(None),
            Err(err) => Err(err).change_context(SwitchError::Api {
                message: format!("Failed to get ConfigMap {namespace}/{SWITCHER_CONFIG_MAP}"),
            }),
        }
    }
}

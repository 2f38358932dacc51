//! In-memory `NotebookRepository` and pod builders shared by the poller
//! and orchestrator tests.

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Mutex;

use async_trait::async_trait;
use error_stack::Report;
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::api::core::v1::PodCondition;
use k8s_openapi::api::core::v1::PodStatus;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use k8s_openapi::chrono::Utc;
use kube::api::DynamicObject;
use tokio::time::Instant;

use crate::k8s::error::SwitchError;
use crate::k8s::repository::NotebookRepository;

type PodListResult = Result<Vec<Pod>, Report<SwitchError>>;
type PodGetResult = Result<Option<Pod>, Report<SwitchError>>;

/// Scripted repository: pod listings and gets are served from queues, and
/// every mutation is recorded for assertions. Exhausted queues mean "no
/// pods yet", which keeps pollers polling.
#[derive(Default)]
pub struct FakeRepository {
    notebooks: Mutex<BTreeMap<String, DynamicObject>>,
    config: Mutex<Option<BTreeMap<String, String>>>,
    pod_lists: Mutex<VecDeque<PodListResult>>,
    pod_gets: Mutex<VecDeque<PodGetResult>>,
    created: Mutex<Vec<DynamicObject>>,
    deleted: Mutex<Vec<String>>,
    list_instants: Mutex<Vec<Instant>>,
    pod_get_count: Mutex<usize>,
    fail_create: AtomicBool,
    fail_delete: AtomicBool,
}

impl FakeRepository {
    pub fn insert_notebook(&self, namespace: &str, name: &str, doc: DynamicObject) {
        self.notebooks
            .lock()
            .unwrap()
            .insert(format!("{namespace}/{name}"), doc);
    }

    pub fn set_config(&self, data: BTreeMap<String, String>) {
        *self.config.lock().unwrap() = Some(data);
    }

    pub fn push_pod_list(&self, result: PodListResult) {
        self.pod_lists.lock().unwrap().push_back(result);
    }

    pub fn push_pod_get(&self, result: PodGetResult) {
        self.pod_gets.lock().unwrap().push_back(result);
    }

    pub fn fail_create(&self) {
        self.fail_create.store(true, Ordering::SeqCst);
    }

    pub fn fail_delete(&self) {
        self.fail_delete.store(true, Ordering::SeqCst);
    }

    pub fn created(&self) -> Vec<DynamicObject> {
        self.created.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn list_instants(&self) -> Vec<Instant> {
        self.list_instants.lock().unwrap().clone()
    }

    pub fn pod_get_count(&self) -> usize {
        *self.pod_get_count.lock().unwrap()
    }
}

#[async_trait]
impl NotebookRepository for FakeRepository {
    async fn get_notebook(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<DynamicObject, Report<SwitchError>> {
        self.notebooks
            .lock()
            .unwrap()
            .get(&format!("{namespace}/{name}"))
            .cloned()
            .ok_or_else(|| {
                Report::new(SwitchError::Api {
                    message: format!("notebook {namespace}/{name} not found"),
                })
            })
    }

    async fn create_notebook(
        &self,
        namespace: &str,
        notebook: &DynamicObject,
    ) -> Result<(), Report<SwitchError>> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(Report::new(SwitchError::Api {
                message: format!("create in {namespace} rejected"),
            }));
        }
        self.created.lock().unwrap().push(notebook.clone());
        Ok(())
    }

    async fn delete_notebook(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<(), Report<SwitchError>> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(Report::new(SwitchError::Api {
                message: format!("delete of {namespace}/{name} rejected"),
            }));
        }
        self.deleted
            .lock()
            .unwrap()
            .push(format!("{namespace}/{name}"));
        Ok(())
    }

    async fn list_pods(
        &self,
        _namespace: &str,
        _label_selector: &str,
    ) -> Result<Vec<Pod>, Report<SwitchError>> {
        self.list_instants.lock().unwrap().push(Instant::now());
        self.pod_lists
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn get_pod(
        &self,
        _namespace: &str,
        _name: &str,
    ) -> Result<Option<Pod>, Report<SwitchError>> {
        *self.pod_get_count.lock().unwrap() += 1;
        self.pod_gets
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(None))
    }

    async fn get_switcher_config(
        &self,
        _namespace: &str,
    ) -> Result<Option<BTreeMap<String, String>>, Report<SwitchError>> {
        Ok(self.config.lock().unwrap().clone())
    }
}

pub fn pod(name: &str) -> Pod {
    let mut pod = Pod::default();
    pod.metadata.name = Some(name.to_string());
    pod
}

pub fn pod_with_phase(name: &str, phase: &str) -> Pod {
    let mut pod = pod(name);
    pod.status = Some(PodStatus {
        phase: Some(phase.to_string()),
        ..PodStatus::default()
    });
    pod
}

pub fn running_ready_pod(name: &str) -> Pod {
    let mut pod = pod_with_phase(name, "Running");
    pod.status.as_mut().expect("status just set").conditions = Some(vec![PodCondition {
        type_: "Ready".to_string(),
        status: "True".to_string(),
        ..PodCondition::default()
    }]);
    pod
}

pub fn deleting_pod(name: &str) -> Pod {
    let mut pod = pod_with_phase(name, "Running");
    pod.metadata.deletion_timestamp = Some(Time(Utc::now()));
    pod
}

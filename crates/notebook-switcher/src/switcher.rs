//! Migration orchestrator: clones a notebook into its GPU or CPU variant,
//! waits for the replacement pod to come up, then retires the source.
//!
//! The run is a straight line: config, fetch, build, create, discover,
//! await ready, grace delay, delete. Failures before the create abort with
//! nothing mutated in the cluster. Failures after it are soft: the source
//! is still retired so the namespace does not end up with two permanently
//! coexisting notebooks, and the outcome carries both the best-known pod
//! name and the error.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use error_stack::Report;
use tokio::time::sleep;
use tokio::time::timeout_at;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing::warn;

use crate::config::GpuProfile;
use crate::k8s::error::SwitchError;
use crate::k8s::repository::NotebookRepository;
use crate::notebook::transform;
use crate::notebook::transform::Direction;
use crate::pods;

/// Budget for the configuration, fetch and create calls combined.
const API_BUDGET: Duration = Duration::from_secs(60);
/// Budget shared by pod discovery and the readiness wait.
const WAIT_BUDGET: Duration = Duration::from_secs(300);
/// Budget for the deletion call.
const DELETE_BUDGET: Duration = Duration::from_secs(30);
/// Unconditional pause before retiring the source, letting in-flight
/// sessions drain.
const GRACE_DELAY: Duration = Duration::from_secs(15);

/// Result of one migration run.
///
/// Partial outcomes are normal: the pod name and the error can both be
/// set, meaning the replacement was created but a later step failed.
/// Callers must inspect the name even when an error is present.
#[derive(Debug)]
pub struct MigrationOutcome {
    /// Name of the replacement notebook's pod, when one was discovered.
    pub new_pod_name: Option<String>,
    /// Failure encountered along the way, if any.
    pub error: Option<Report<SwitchError>>,
}

impl MigrationOutcome {
    fn aborted(error: Report<SwitchError>) -> Self {
        Self {
            new_pod_name: None,
            error: Some(error),
        }
    }
}

/// Entry point the notification boundary calls into.
#[async_trait]
pub trait Migrator: Send + Sync {
    async fn switch_to_gpu(&self, notebook_name: &str, namespace: &str) -> MigrationOutcome;
    async fn switch_to_cpu(&self, notebook_name: &str, namespace: &str) -> MigrationOutcome;
}

pub struct Switcher<R> {
    repository: R,
    cancel: CancellationToken,
}

impl<R: NotebookRepository> Switcher<R> {
    pub fn new(repository: R, cancel: CancellationToken) -> Self {
        Self { repository, cancel }
    }

    async fn run(
        &self,
        direction: Direction,
        notebook_name: &str,
        namespace: &str,
    ) -> MigrationOutcome {
        info!(%namespace, %notebook_name, variant = %direction, "Migrating notebook");
        match self
            .create_replacement(direction, notebook_name, namespace)
            .await
        {
            Ok(target_name) => {
                self.finish_migration(notebook_name, &target_name, namespace)
                    .await
            }
            Err(error) => MigrationOutcome::aborted(error),
        }
    }

    /// Configuration, fetch, build, create. Every failure here aborts the
    /// migration; nothing has been mutated in the cluster until the final
    /// create call goes through.
    async fn create_replacement(
        &self,
        direction: Direction,
        notebook_name: &str,
        namespace: &str,
    ) -> Result<String, Report<SwitchError>> {
        let api_deadline = Instant::now() + API_BUDGET;

        let profile = self.load_gpu_profile(namespace, api_deadline).await;
        info!(
            %namespace,
            resource_key = %profile.resource_key,
            count = profile.count,
            "Using GPU profile"
        );

        let source = run_with_deadline(
            api_deadline,
            "fetch of the source notebook",
            self.repository.get_notebook(namespace, notebook_name),
        )
        .await?;

        let target_name = transform::derive_target_name(notebook_name, direction);
        let mut replacement = source.clone();
        transform::scrub_for_recreation(&mut replacement, &target_name);
        match direction {
            Direction::Gpu => {
                transform::inject_gpu_profile(&mut replacement, &profile.resource_key, profile.count)?;
            }
            Direction::Cpu => {
                transform::strip_gpu_profile(&mut replacement, &profile.resource_key)?;
            }
        }

        run_with_deadline(
            api_deadline,
            "creation of the replacement notebook",
            self.repository.create_notebook(namespace, &replacement),
        )
        .await?;
        info!(%namespace, %target_name, "Replacement notebook created");

        Ok(target_name)
    }

    /// Configuration read with a soft-fail contract: any failure falls
    /// back to the default profile so the migration still proceeds.
    async fn load_gpu_profile(&self, namespace: &str, deadline: Instant) -> GpuProfile {
        match timeout_at(deadline, self.repository.get_switcher_config(namespace)).await {
            Ok(Ok(Some(data))) => GpuProfile::from_config_data(&data),
            Ok(Ok(None)) => GpuProfile::default(),
            Ok(Err(error)) => {
                warn!(%namespace, ?error, "Failed to read switcher config, using defaults");
                GpuProfile::default()
            }
            Err(_) => {
                warn!(%namespace, "Timed out reading switcher config, using defaults");
                GpuProfile::default()
            }
        }
    }

    /// Discovery, readiness, grace delay, deletion.
    ///
    /// Failures while waiting for the replacement are logged but do not
    /// abort; the source is still retired afterwards.
    async fn finish_migration(
        &self,
        source_name: &str,
        target_name: &str,
        namespace: &str,
    ) -> MigrationOutcome {
        let (new_pod_name, mut error) = self.await_replacement(target_name, namespace).await;

        // Let in-flight sessions on the source drain before retiring it.
        sleep(GRACE_DELAY).await;

        let delete_deadline = Instant::now() + DELETE_BUDGET;
        let delete_result = run_with_deadline(
            delete_deadline,
            "deletion of the source notebook",
            self.repository.delete_notebook(namespace, source_name),
        )
        .await;
        match delete_result {
            Ok(()) => info!(
                %namespace,
                %source_name,
                "Requested deletion of source notebook (foreground propagation)"
            ),
            Err(delete_error) => {
                warn!(%namespace, %source_name, ?delete_error, "Failed to delete source notebook");
                match error.as_mut() {
                    Some(report) => report.extend_one(delete_error),
                    None => error = Some(delete_error),
                }
            }
        }

        MigrationOutcome {
            new_pod_name,
            error,
        }
    }

    /// Discovery plus readiness as an explicit (name, outcome) pair so the
    /// remaining steps run regardless of how the wait ended.
    async fn await_replacement(
        &self,
        target_name: &str,
        namespace: &str,
    ) -> (Option<String>, Option<Report<SwitchError>>) {
        let wait_deadline = Instant::now() + WAIT_BUDGET;

        let pod_name = match pods::find_first_pod_by_notebook(
            &self.repository,
            namespace,
            target_name,
            Some(wait_deadline),
            &self.cancel,
        )
        .await
        {
            Ok(name) => name,
            Err(error) => {
                warn!(%namespace, %target_name, ?error, "Replacement pod never showed up");
                return (None, Some(error));
            }
        };
        info!(%namespace, %pod_name, "Replacement pod discovered");

        match pods::wait_pod_ready(
            &self.repository,
            namespace,
            &pod_name,
            Some(wait_deadline),
            WAIT_BUDGET,
            &self.cancel,
        )
        .await
        {
            Ok(()) => {
                info!(%namespace, %pod_name, "Replacement pod is ready");
                (Some(pod_name), None)
            }
            Err(error) => {
                warn!(%namespace, %pod_name, ?error, "Replacement pod did not become ready");
                (Some(pod_name), Some(error))
            }
        }
    }
}

#[async_trait]
impl<R: NotebookRepository> Migrator for Switcher<R> {
    async fn switch_to_gpu(&self, notebook_name: &str, namespace: &str) -> MigrationOutcome {
        self.run(Direction::Gpu, notebook_name, namespace).await
    }

    async fn switch_to_cpu(&self, notebook_name: &str, namespace: &str) -> MigrationOutcome {
        self.run(Direction::Cpu, notebook_name, namespace).await
    }
}

/// Await `future` under `deadline`, mapping expiry to a `Timeout`.
async fn run_with_deadline<T>(
    deadline: Instant,
    operation: &str,
    future: impl Future<Output = Result<T, Report<SwitchError>>>,
) -> Result<T, Report<SwitchError>> {
    match timeout_at(deadline, future).await {
        Ok(result) => result,
        Err(_) => Err(Report::new(SwitchError::Timeout {
            operation: operation.to_string(),
        })),
    }
}

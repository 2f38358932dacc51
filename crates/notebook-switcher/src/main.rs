mod api;
mod config;
mod k8s;
mod logging;
mod notebook;
mod pods;
mod switcher;
#[cfg(test)]
mod test_support;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;

use crate::api::server::ApiServer;
use crate::config::Cli;
use crate::k8s::client::init_kube_client;
use crate::k8s::repository::KubeRepository;
use crate::switcher::Switcher;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init();

    let client = init_kube_client(cli.kubeconfig.clone())
        .await
        .map_err(|report| anyhow::anyhow!("failed to initialize Kubernetes client: {report:?}"))?;

    // One token covers every polling loop and the listener itself, so a
    // shutdown request aborts in-flight waits immediately.
    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutdown signal received");
                shutdown.cancel();
            }
        });
    }

    let repository = KubeRepository::new(client);
    let migrator = Arc::new(Switcher::new(repository, shutdown.clone()));

    let server = ApiServer::new(migrator, cli.listen_addr.clone());
    server
        .run(shutdown)
        .await
        .map_err(|report| anyhow::anyhow!("notification listener failed: {report:?}"))?;

    Ok(())
}

use std::sync::Arc;

use poem::handler;
use poem::http::StatusCode;
use poem::web::Data;
use poem::web::Json;
use poem::Body;
use tracing::info;
use tracing::warn;

use super::types::NotifyMessage;
use super::types::NotifyResponse;
use crate::notebook::names;
use crate::switcher::Migrator;

pub type SharedMigrator = Arc<dyn Migrator>;

/// Receive a usage notification and run the matching migration.
///
/// The response contract is deliberately forgiving: once the body parses,
/// the status is always `received` and migration failures only show up in
/// the logs. `GPUNeeded` takes precedence when both flags are set, so one
/// notification triggers at most one migration.
#[handler]
pub async fn receive_message(
    body: Body,
    migrator: Data<&SharedMigrator>,
) -> poem::Result<Json<NotifyResponse>> {
    let bytes = body
        .into_vec()
        .await
        .map_err(|_| poem::Error::from_status(StatusCode::BAD_REQUEST))?;
    let message: NotifyMessage = serde_json::from_slice(&bytes)
        .map_err(|_| poem::Error::from_string("Invalid JSON payload", StatusCode::BAD_REQUEST))?;

    let notebook_name = names::logical_notebook_name(&message.pod_name).to_string();
    let namespace = message.pod_namespace.clone();

    let outcome = if message.wants_gpu() {
        info!(%namespace, %notebook_name, "GPU-needed notification received");
        Some(migrator.switch_to_gpu(&notebook_name, &namespace).await)
    } else if message.releases_gpu() {
        info!(%namespace, %notebook_name, "GPU-released notification received");
        Some(migrator.switch_to_cpu(&notebook_name, &namespace).await)
    } else {
        None
    };

    let mut new_nb_name = String::new();
    if let Some(outcome) = outcome {
        if let Some(error) = &outcome.error {
            warn!(%namespace, %notebook_name, ?error, "Migration finished with errors");
        }
        if let Some(pod_name) = &outcome.new_pod_name {
            new_nb_name = names::logical_notebook_name(pod_name).to_string();
        }
    }

    let new_url = names::notebook_url(&namespace, &new_nb_name);
    Ok(Json(NotifyResponse {
        status: "received",
        pod_namespace: namespace,
        new_nb_name,
        new_url,
    }))
}

/// CORS preflight: the headers come from the middleware, the body stays
/// empty.
#[handler]
pub fn preflight() {}

use serde::Deserialize;
use serde::Serialize;

/// Usage notification pushed by the activity monitor.
///
/// Flags are booleans encoded as strings; anything other than `"true"`
/// counts as false, and missing fields default to empty.
#[derive(Debug, Default, Deserialize)]
pub struct NotifyMessage {
    #[serde(rename = "GPUNeeded", default)]
    pub gpu_needed: String,
    #[serde(rename = "GPUReleased", default)]
    pub gpu_released: String,
    #[serde(rename = "PodName", default)]
    pub pod_name: String,
    #[serde(rename = "PodNamespace", default)]
    pub pod_namespace: String,
}

impl NotifyMessage {
    pub fn wants_gpu(&self) -> bool {
        self.gpu_needed == "true"
    }

    pub fn releases_gpu(&self) -> bool {
        self.gpu_released == "true"
    }
}

/// Acknowledgement returned for every parsed notification, regardless of
/// how the migration itself went.
#[derive(Debug, Serialize)]
pub struct NotifyResponse {
    pub status: &'static str,
    #[serde(rename = "podNamespace")]
    pub pod_namespace: String,
    #[serde(rename = "newNBName")]
    pub new_nb_name: String,
    #[serde(rename = "newURL")]
    pub new_url: String,
}

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::Parser;

/// GPU resource key used when the per-namespace ConfigMap is absent or
/// malformed.
pub const DEFAULT_GPU_RESOURCE_KEY: &str = "nvidia.com/gpu";
/// GPU count used when the per-namespace ConfigMap is absent or malformed.
pub const DEFAULT_GPU_COUNT: u32 = 1;

/// Name of the namespace-scoped ConfigMap carrying the GPU profile.
pub const SWITCHER_CONFIG_MAP: &str = "gpu-switcher-config";
/// ConfigMap key holding the GPU resource identifier.
pub const CONFIG_KEY_RESOURCE: &str = "gpuResourceKey";
/// ConfigMap key holding the GPU count as a decimal string.
pub const CONFIG_KEY_COUNT: &str = "numGpuResource";

#[derive(Parser, Debug)]
#[command(about = "Migrates Kubeflow Notebooks between GPU and CPU variants")]
pub struct Cli {
    /// Address the notification listener binds to
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    pub listen_addr: String,

    /// Path to a kubeconfig file (in-cluster config or ~/.kube/config when
    /// omitted)
    #[arg(long, env = "KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,
}

/// GPU resource profile injected into or stripped from notebook containers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpuProfile {
    pub resource_key: String,
    pub count: u32,
}

impl Default for GpuProfile {
    fn default() -> Self {
        Self {
            resource_key: DEFAULT_GPU_RESOURCE_KEY.to_string(),
            count: DEFAULT_GPU_COUNT,
        }
    }
}

impl GpuProfile {
    /// Parse a profile from the switcher ConfigMap data.
    ///
    /// Configuration is best-effort by contract: a missing key, an empty
    /// value or an unparsable count falls back to the default profile
    /// rather than failing the migration.
    pub fn from_config_data(data: &BTreeMap<String, String>) -> Self {
        let resource_key = data.get(CONFIG_KEY_RESOURCE);
        let count = data.get(CONFIG_KEY_COUNT);
        match (resource_key, count) {
            (Some(key), Some(count)) if !key.is_empty() && !count.is_empty() => {
                match count.trim().parse::<u32>() {
                    Ok(count) => Self {
                        resource_key: key.clone(),
                        count,
                    },
                    Err(_) => Self::default(),
                }
            }
            _ => Self::default(),
        }
    }
}

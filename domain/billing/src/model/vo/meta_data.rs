use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{CloudProvider, InstanceCategory};

/// Compute types reported by nodes that are backed by serverless capacity.
const VIRTUAL_COMPUTE_TYPES: [&str; 2] = ["fargate", "virtual"];

/// Instance metadata with the keys billing understands lifted into fields.
///
/// Keys nobody reads typed stay in `extra` so a read-modify-write keeps them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceMetaData {
    pub cloud_provider: CloudProvider,
    pub region: Option<String>,
    pub zone: Option<String>,
    pub instance_family: Option<String>,
    pub instance_category: InstanceCategory,
    pub compute_type: Option<String>,
    /// Provider id of the underlying machine, the key billing exports use.
    pub cloud_provider_instance_id: Option<String>,
    pub parent_resource_id: Option<String>,
    pub actual_parent_resource_id: Option<String>,
    pub parent_resource_cpu: Option<f64>,
    pub parent_resource_memory: Option<f64>,
    pub namespace: Option<String>,
    pub workload_name: Option<String>,
    pub workload_type: Option<String>,
    pub launch_type: Option<String>,
    pub ecs_service_name: Option<String>,
    pub task_id: Option<String>,
    /// Claims a pod mounts, resolved in the pod's namespace.
    pub claim_names: Vec<String>,
    /// Claim bound to a persistent volume.
    pub claim_name: Option<String>,
    pub claim_namespace: Option<String>,
    pub storage_class: Option<String>,
    pub volume_id: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl InstanceMetaData {
    pub fn is_virtual_compute(&self) -> bool {
        self.compute_type.as_deref().is_some_and(|compute_type| {
            VIRTUAL_COMPUTE_TYPES
                .iter()
                .any(|virtual_type| compute_type.eq_ignore_ascii_case(virtual_type))
        })
    }
}

/// Ownership of the workload an instance belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceInfo {
    pub service_id: Option<String>,
    pub env_id: Option<String>,
    pub app_id: Option<String>,
    pub org_id: Option<String>,
    pub project_id: Option<String>,
}

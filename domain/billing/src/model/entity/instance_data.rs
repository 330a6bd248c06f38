use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::vo::{
    ClaimKey, InstanceKey, InstanceMetaData, InstanceState, InstanceType, Resource, ServiceInfo,
    StorageResource,
};

/// One tracked resource instance as the instance store keeps it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InstanceData {
    pub account_id: String,
    pub instance_id: String,
    #[serde(default)]
    pub instance_name: String,
    /// `None` when the store holds a type this engine doesn't know.
    #[serde(default)]
    pub instance_type: Option<InstanceType>,
    #[serde(default)]
    pub cluster_id: Option<String>,
    #[serde(default)]
    pub cluster_name: Option<String>,
    #[serde(default)]
    pub setting_id: Option<String>,
    #[serde(default)]
    pub state: InstanceState,
    #[serde(default)]
    pub usage_start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub usage_stop_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_resource: Resource,
    #[serde(default)]
    pub allocatable_resource: Option<Resource>,
    #[serde(default)]
    pub limit_resource: Option<Resource>,
    #[serde(default)]
    pub storage_resource: Option<StorageResource>,
    #[serde(default)]
    pub meta_data: InstanceMetaData,
    #[serde(default)]
    pub service_info: Option<ServiceInfo>,
    /// Cursor the store uses to revisit instances that are still active.
    #[serde(default)]
    pub active_instance_iterator: Option<DateTime<Utc>>,
}

impl InstanceData {
    /// Instances without a type, and nodes backed by serverless capacity,
    /// are never billed.
    pub fn is_valid_for_billing(&self) -> bool {
        match self.instance_type {
            None => false,
            Some(InstanceType::K8sNode) => !self.meta_data.is_virtual_compute(),
            Some(_) => true,
        }
    }

    pub fn key(&self) -> InstanceKey {
        InstanceKey::new(self.instance_id.clone(), self.cluster_id.clone())
    }

    pub fn limit(&self) -> Resource {
        self.limit_resource.unwrap_or_default()
    }

    pub fn namespace(&self) -> Option<&str> {
        self.meta_data.namespace.as_deref()
    }

    /// Claims this instance mounts, keyed in its own namespace.
    pub fn claim_keys(&self) -> Vec<ClaimKey> {
        let Some(namespace) = self.namespace() else {
            return vec![];
        };
        self.meta_data
            .claim_names
            .iter()
            .map(|claim_name| ClaimKey::new(namespace, claim_name.as_str()))
            .collect()
    }

    /// The claim a persistent volume is bound to.
    pub fn bound_claim(&self) -> Option<ClaimKey> {
        let namespace = self.meta_data.claim_namespace.as_deref()?;
        let claim_name = self.meta_data.claim_name.as_deref()?;
        Some(ClaimKey::new(namespace, claim_name))
    }

    /// Id the provider's billing export knows this instance by.
    pub fn pricing_resource_id(&self) -> Option<&str> {
        let meta = &self.meta_data;
        match self.instance_type? {
            InstanceType::K8sPv => meta.volume_id.as_deref(),
            InstanceType::EcsTaskFargate | InstanceType::K8sPodFargate => {
                meta.task_id.as_deref().or(Some(self.instance_id.as_str()))
            }
            _ => meta.cloud_provider_instance_id.as_deref(),
        }
    }

    /// Running for a while past its recorded stop time.
    pub fn is_stale_running(&self, cutoff: DateTime<Utc>) -> bool {
        self.state == InstanceState::Running
            && self.usage_stop_time.is_some_and(|stop| stop < cutoff)
    }

    pub fn needs_active_iterator(&self) -> bool {
        self.active_instance_iterator.is_none() && self.usage_stop_time.is_none()
    }
}

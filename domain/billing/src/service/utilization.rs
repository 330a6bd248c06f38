use std::collections::HashMap;

use async_trait::async_trait;

use crate::model::{
    entity::InstanceData,
    vo::{BillingWindow, UtilizationData},
};

#[async_trait]
pub trait UtilizationService: Send + Sync {
    /// Utilization summaries keyed by instance id. Instances without samples
    /// are absent from the map.
    async fn get_utilization(
        &self,
        instances: &[InstanceData],
        window: &BillingWindow,
        account_id: &str,
        setting_id: Option<String>,
        cluster_id: Option<String>,
    ) -> anyhow::Result<HashMap<String, UtilizationData>>;
}

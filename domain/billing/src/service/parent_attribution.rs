use std::collections::HashMap;

use async_trait::async_trait;

use crate::model::{
    entity::InstanceData,
    vo::{BillingWindow, InstanceKey},
};

#[async_trait]
pub trait ParentAttributionService: Send + Sync {
    /// Instance id of the machine `instance` runs on, if it has one.
    async fn resolve_parent_id(&self, instance: &InstanceData) -> anyhow::Result<Option<String>>;

    /// Active seconds of `parents` inside `window`, keyed by instance and cluster.
    fn active_seconds(
        &self,
        parents: &[InstanceData],
        window: &BillingWindow,
    ) -> HashMap<InstanceKey, f64>;
}

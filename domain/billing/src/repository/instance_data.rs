use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::model::{
    entity::InstanceData,
    vo::{BillingWindow, InstanceType},
};

/// Filter of a chunked instance read.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceQuery {
    pub account_id: String,
    /// `None` reads every cluster of the account.
    pub cluster_id: Option<String>,
    pub instance_types: Vec<InstanceType>,
    pub window: BillingWindow,
}

#[async_trait]
pub trait InstanceDataRepo: Send + Sync {
    /// Instances matching `query` that were active at some point of its
    /// window or are still recorded as running, ordered by usage start time
    /// then instance id.
    async fn get_active_instances(
        &self,
        query: &InstanceQuery,
        offset: usize,
        limit: usize,
    ) -> anyhow::Result<Vec<InstanceData>>;

    async fn get_by_ids(
        &self,
        account_id: &str,
        instance_ids: &[String],
    ) -> anyhow::Result<Vec<InstanceData>>;

    /// Latest instance named `instance_name` that had started by `as_of`.
    async fn get_by_name(
        &self,
        account_id: &str,
        cluster_id: Option<String>,
        instance_name: &str,
        as_of: DateTime<Utc>,
    ) -> anyhow::Result<Option<InstanceData>>;

    /// Moves an instance that kept its running state past its stop time to stopped.
    async fn mark_stopped(&self, instance: &InstanceData) -> anyhow::Result<()>;

    /// Seeds the active-iteration cursor of a still running instance.
    async fn initialize_active_iterator(&self, instance: &InstanceData) -> anyhow::Result<()>;
}

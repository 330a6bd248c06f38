use async_trait::async_trait;

use crate::model::{entity::InstanceBillingData, vo::BatchJobType};

#[async_trait]
pub trait InstanceBillingDataRepo: Send + Sync {
    /// Upserts on `(account_id, instance_id, start_timestamp)`, writing the
    /// same rows twice leaves one copy.
    async fn create(
        &self,
        rows: &[InstanceBillingData],
        job_type: BatchJobType,
    ) -> anyhow::Result<()>;
}

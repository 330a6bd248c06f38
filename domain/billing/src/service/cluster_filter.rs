use async_trait::async_trait;

use crate::model::vo::BillingWindow;

#[async_trait]
pub trait ClusterFilterPolicy: Send + Sync {
    async fn should_bill(
        &self,
        account_id: &str,
        cluster_id: &str,
        window: &BillingWindow,
    ) -> anyhow::Result<bool>;
}
